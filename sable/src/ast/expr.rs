//! Expression and statement AST nodes

use super::{ContractExpr, Spanned};
use serde::{Deserialize, Serialize};

/// Sequence of statements. A block yields the value of its trailing
/// expression statement, or void.
pub type Block = Vec<Spanned<Stmt>>;

/// Literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Void,
    Integer(i64),
    Real(f64),
    Boolean(bool),
    String(String),
}

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),

    /// Variable reference
    Ident(String),

    Binary {
        left: Box<Spanned<Expr>>,
        op: BinOp,
        right: Box<Spanned<Expr>>,
    },

    Unary {
        op: UnOp,
        expr: Box<Spanned<Expr>>,
    },

    /// Nested block with its own scope
    Block(Block),

    If {
        cond: Box<Spanned<Expr>>,
        then_branch: Block,
        else_branch: Option<Block>,
    },

    Call {
        callee: Box<Spanned<Expr>>,
        args: Vec<Spanned<Expr>>,
    },

    /// Member access: expr.name
    Member {
        object: Box<Spanned<Expr>>,
        name: Spanned<String>,
    },

    Index {
        object: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },

    ArrayLit(Vec<Spanned<Expr>>),

    /// Object literal: { name: value, ... }
    ObjectLit(Vec<FieldInit>),

    /// Anonymous routine
    Lambda(Box<Lambda>),

    /// Explicit conversion: expr as Contract
    Convert {
        expr: Box<Spanned<Expr>>,
        contract: Spanned<ContractExpr>,
    },

    /// Conformance test: expr is Contract
    Is {
        expr: Box<Spanned<Expr>>,
        contract: Spanned<ContractExpr>,
    },

    /// Contract used as a (meta) value
    Contract(ContractExpr),

    /// checked { ... } / unchecked { ... }
    Context { checked: bool, body: Block },

    /// fork [on target] [via queue] { ... }
    Fork {
        target: Option<Box<Spanned<Expr>>>,
        queue: Option<Box<Spanned<Expr>>>,
        body: Block,
    },

    /// synchronized(target) [via queue] { ... }
    Synchronized {
        target: Box<Spanned<Expr>>,
        queue: Option<Box<Spanned<Expr>>>,
        body: Block,
    },

    /// await(handle, timeout_ms, fallback)
    Await {
        handle: Box<Spanned<Expr>>,
        timeout: Box<Spanned<Expr>>,
        fallback: Box<Spanned<Expr>>,
    },

    /// Block until a proxy resolves
    Unwrap(Box<Spanned<Expr>>),
}

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// let / const declaration
    Let {
        name: Spanned<String>,
        #[serde(default)]
        contract: Option<Spanned<ContractExpr>>,
        #[serde(default)]
        value: Option<Spanned<Expr>>,
        #[serde(default)]
        constant: bool,
    },

    Function(FnDecl),

    Expr(Expr),

    Assign {
        target: Spanned<Expr>,
        value: Spanned<Expr>,
    },

    /// Return a mutable variable to the uninitialized state
    Delete(Spanned<String>),

    Return(Option<Spanned<Expr>>),

    While {
        #[serde(default)]
        label: Option<String>,
        cond: Spanned<Expr>,
        body: Block,
    },

    ForEach {
        #[serde(default)]
        label: Option<String>,
        var: Spanned<String>,
        iterable: Spanned<Expr>,
        body: Block,
    },

    Break(Option<String>),

    Continue(Option<String>),

    /// Raise a fault carrying the given value
    Raise(Spanned<Expr>),

    Try {
        body: Block,
        #[serde(default)]
        handler: Option<Handler>,
        #[serde(default)]
        finally: Option<Block>,
    },
}

/// `else [binding] { ... }` arm of a try statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handler {
    #[serde(default)]
    pub binding: Option<Spanned<String>>,
    pub body: Block,
}

/// Named function declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FnDecl {
    pub name: Spanned<String>,
    pub params: Vec<Param>,
    #[serde(default)]
    pub ret: Option<Spanned<ContractExpr>>,
    /// Calls with matching arity may bypass dynamic dispatch
    #[serde(default)]
    pub inline: bool,
    pub body: Block,
}

/// Anonymous routine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lambda {
    pub params: Vec<Param>,
    #[serde(default)]
    pub ret: Option<Spanned<ContractExpr>>,
    pub body: Block,
}

/// Routine parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: Spanned<String>,
    #[serde(default)]
    pub contract: Option<Spanned<ContractExpr>>,
}

/// Member initializer in an object literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInit {
    pub name: Spanned<String>,
    pub value: Spanned<Expr>,
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    // Logical (short-circuit)
    And,
    Or,
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        };
        f.write_str(text)
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    /// Negation (-)
    Neg,
    /// Logical not
    Not,
}

impl std::fmt::Display for UnOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnOp::Neg => write!(f, "-"),
            UnOp::Not => write!(f, "not"),
        }
    }
}
