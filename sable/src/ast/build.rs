//! Helpers for assembling trees in code
//!
//! Hosts that embed the compiler without a parser (and the test suites)
//! build programs with these instead of spelling out every `Spanned` wrapper.

use super::*;

pub type SExpr = Spanned<Expr>;
pub type SStmt = Spanned<Stmt>;

pub fn int(n: i64) -> SExpr {
    Spanned::bare(Expr::Literal(Literal::Integer(n)))
}

pub fn real(x: f64) -> SExpr {
    Spanned::bare(Expr::Literal(Literal::Real(x)))
}

pub fn boolean(b: bool) -> SExpr {
    Spanned::bare(Expr::Literal(Literal::Boolean(b)))
}

pub fn string(s: &str) -> SExpr {
    Spanned::bare(Expr::Literal(Literal::String(s.to_string())))
}

pub fn void() -> SExpr {
    Spanned::bare(Expr::Literal(Literal::Void))
}

pub fn ident(name: &str) -> SExpr {
    Spanned::bare(Expr::Ident(name.to_string()))
}

pub fn binary(left: SExpr, op: BinOp, right: SExpr) -> SExpr {
    Spanned::bare(Expr::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    })
}

pub fn unary(op: UnOp, expr: SExpr) -> SExpr {
    Spanned::bare(Expr::Unary {
        op,
        expr: Box::new(expr),
    })
}

pub fn call(callee: SExpr, args: Vec<SExpr>) -> SExpr {
    Spanned::bare(Expr::Call {
        callee: Box::new(callee),
        args,
    })
}

/// Call a routine by name
pub fn invoke(name: &str, args: Vec<SExpr>) -> SExpr {
    call(ident(name), args)
}

pub fn member(object: SExpr, name: &str) -> SExpr {
    Spanned::bare(Expr::Member {
        object: Box::new(object),
        name: Spanned::bare(name.to_string()),
    })
}

pub fn index(object: SExpr, idx: SExpr) -> SExpr {
    Spanned::bare(Expr::Index {
        object: Box::new(object),
        index: Box::new(idx),
    })
}

pub fn array(items: Vec<SExpr>) -> SExpr {
    Spanned::bare(Expr::ArrayLit(items))
}

pub fn object(fields: Vec<(&str, SExpr)>) -> SExpr {
    Spanned::bare(Expr::ObjectLit(
        fields
            .into_iter()
            .map(|(name, value)| FieldInit {
                name: Spanned::bare(name.to_string()),
                value,
            })
            .collect(),
    ))
}

pub fn block(body: Block) -> SExpr {
    Spanned::bare(Expr::Block(body))
}

pub fn if_else(cond: SExpr, then_branch: Block, else_branch: Option<Block>) -> SExpr {
    Spanned::bare(Expr::If {
        cond: Box::new(cond),
        then_branch,
        else_branch,
    })
}

pub fn lambda(params: &[&str], body: Block) -> SExpr {
    Spanned::bare(Expr::Lambda(Box::new(Lambda {
        params: params.iter().map(|p| param(p, None)).collect(),
        ret: None,
        body,
    })))
}

pub fn convert(expr: SExpr, contract: ContractExpr) -> SExpr {
    Spanned::bare(Expr::Convert {
        expr: Box::new(expr),
        contract: Spanned::bare(contract),
    })
}

pub fn is(expr: SExpr, contract: ContractExpr) -> SExpr {
    Spanned::bare(Expr::Is {
        expr: Box::new(expr),
        contract: Spanned::bare(contract),
    })
}

pub fn contract(contract: ContractExpr) -> SExpr {
    Spanned::bare(Expr::Contract(contract))
}

pub fn checked(body: Block) -> SExpr {
    Spanned::bare(Expr::Context {
        checked: true,
        body,
    })
}

pub fn unchecked(body: Block) -> SExpr {
    Spanned::bare(Expr::Context {
        checked: false,
        body,
    })
}

pub fn fork(body: Block) -> SExpr {
    Spanned::bare(Expr::Fork {
        target: None,
        queue: None,
        body,
    })
}

pub fn fork_on(target: Option<SExpr>, queue: Option<SExpr>, body: Block) -> SExpr {
    Spanned::bare(Expr::Fork {
        target: target.map(Box::new),
        queue: queue.map(Box::new),
        body,
    })
}

pub fn synchronized(target: SExpr, queue: Option<SExpr>, body: Block) -> SExpr {
    Spanned::bare(Expr::Synchronized {
        target: Box::new(target),
        queue: queue.map(Box::new),
        body,
    })
}

pub fn await_(handle: SExpr, timeout_ms: SExpr, fallback: SExpr) -> SExpr {
    Spanned::bare(Expr::Await {
        handle: Box::new(handle),
        timeout: Box::new(timeout_ms),
        fallback: Box::new(fallback),
    })
}

pub fn unwrap(expr: SExpr) -> SExpr {
    Spanned::bare(Expr::Unwrap(Box::new(expr)))
}

// ---- statements ----

pub fn expr(e: SExpr) -> SStmt {
    Spanned::new(Stmt::Expr(e.node), e.span)
}

pub fn let_(name: &str, value: SExpr) -> SStmt {
    Spanned::bare(Stmt::Let {
        name: Spanned::bare(name.to_string()),
        contract: None,
        value: Some(value),
        constant: false,
    })
}

pub fn let_typed(name: &str, contract: ContractExpr, value: Option<SExpr>) -> SStmt {
    Spanned::bare(Stmt::Let {
        name: Spanned::bare(name.to_string()),
        contract: Some(Spanned::bare(contract)),
        value,
        constant: false,
    })
}

pub fn const_(name: &str, value: Option<SExpr>) -> SStmt {
    Spanned::bare(Stmt::Let {
        name: Spanned::bare(name.to_string()),
        contract: None,
        value,
        constant: true,
    })
}

pub fn assign(target: SExpr, value: SExpr) -> SStmt {
    Spanned::bare(Stmt::Assign { target, value })
}

pub fn delete(name: &str) -> SStmt {
    Spanned::bare(Stmt::Delete(Spanned::bare(name.to_string())))
}

pub fn ret(value: Option<SExpr>) -> SStmt {
    Spanned::bare(Stmt::Return(value))
}

pub fn raise(value: SExpr) -> SStmt {
    Spanned::bare(Stmt::Raise(value))
}

pub fn while_(label: Option<&str>, cond: SExpr, body: Block) -> SStmt {
    Spanned::bare(Stmt::While {
        label: label.map(str::to_string),
        cond,
        body,
    })
}

pub fn for_each(label: Option<&str>, var: &str, iterable: SExpr, body: Block) -> SStmt {
    Spanned::bare(Stmt::ForEach {
        label: label.map(str::to_string),
        var: Spanned::bare(var.to_string()),
        iterable,
        body,
    })
}

pub fn break_(label: Option<&str>) -> SStmt {
    Spanned::bare(Stmt::Break(label.map(str::to_string)))
}

pub fn continue_(label: Option<&str>) -> SStmt {
    Spanned::bare(Stmt::Continue(label.map(str::to_string)))
}

pub fn try_(body: Block, handler: Option<(Option<&str>, Block)>, finally: Option<Block>) -> SStmt {
    Spanned::bare(Stmt::Try {
        body,
        handler: handler.map(|(binding, body)| Handler {
            binding: binding.map(|b| Spanned::bare(b.to_string())),
            body,
        }),
        finally,
    })
}

pub fn param(name: &str, contract: Option<ContractExpr>) -> Param {
    Param {
        name: Spanned::bare(name.to_string()),
        contract: contract.map(Spanned::bare),
    }
}

pub fn function(name: &str, params: Vec<Param>, ret: Option<ContractExpr>, body: Block) -> SStmt {
    Spanned::bare(Stmt::Function(FnDecl {
        name: Spanned::bare(name.to_string()),
        params,
        ret: ret.map(Spanned::bare),
        inline: false,
        body,
    }))
}

pub fn inline_function(
    name: &str,
    params: Vec<Param>,
    ret: Option<ContractExpr>,
    body: Block,
) -> SStmt {
    let mut stmt = function(name, params, ret, body);
    if let Stmt::Function(decl) = &mut stmt.node {
        decl.inline = true;
    }
    stmt
}
