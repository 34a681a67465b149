//! Expression lowering

use std::collections::BTreeSet;
use std::sync::Arc;

use super::contract::{literal_value, ContractSource};
use super::scope::{Declaration, Resolved, RoutineInfo, RoutineKind, ScopeKind};
use super::Compiler;
use crate::ast::{BinOp, Block, Expr, FieldInit, Lambda, Span, Spanned, Stmt, UnOp};
use crate::contract::{convert, element_at_rank, union, ArithmeticMode, Contract, Relationship};
use crate::error::{CompileError, Result};
use crate::interp::{
    binary_op, invoke, unary_op, Eval, Frame, InterpResult, NativeFunction, RuntimeError,
    ScriptObject, Value,
};

/// Compiled expression with the contract its values are known to satisfy
/// (Super when nothing is known)
#[derive(Clone)]
pub(crate) struct Lowered {
    pub eval: Eval,
    pub contract: Contract,
}

impl Lowered {
    pub fn new(eval: Eval, contract: Contract) -> Self {
        Lowered { eval, contract }
    }

    pub fn constant(value: Value) -> Self {
        let contract = Contract::of(&value);
        Lowered::new(Arc::new(move |_: &mut Frame| Ok(value.clone())), contract)
    }

    pub fn void() -> Self {
        Lowered::constant(Value::Void)
    }
}

pub(crate) fn eval_all(evals: &[Eval], frame: &mut Frame) -> InterpResult<Vec<Value>> {
    evals.iter().map(|eval| eval(frame)).collect()
}

impl Compiler {
    pub(super) fn lower_spanned(&mut self, expr: &Spanned<Expr>) -> Result<Lowered> {
        self.lower_expr(&expr.node, expr.span)
    }

    pub(super) fn lower_expr(&mut self, expr: &Expr, span: Span) -> Result<Lowered> {
        match expr {
            Expr::Literal(literal) => Ok(Lowered::constant(literal_value(literal))),
            Expr::Ident(name) => self.lower_ident(name, span),
            Expr::Binary { left, op, right } => self.lower_binary(left, *op, right),
            Expr::Unary { op, expr } => self.lower_unary(*op, expr),
            Expr::Block(body) => self.lower_block(body, ScopeKind::Generic),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch.as_ref()),
            Expr::Call { callee, args } => self.lower_call(callee, args),
            Expr::Member { object, name } => self.lower_member(object, &name.node),
            Expr::Index { object, index } => self.lower_index(object, index),
            Expr::ArrayLit(items) => self.lower_array(items),
            Expr::ObjectLit(fields) => self.lower_object(fields),
            Expr::Lambda(lambda) => self.lower_lambda(lambda),
            Expr::Convert { expr, contract } => {
                let inner = self.lower_spanned(expr)?;
                let source = self.lower_contract(&contract.node, contract.span)?;
                Ok(self.lower_convert(inner, source))
            }
            Expr::Is { expr, contract } => {
                let inner = self.lower_spanned(expr)?.eval;
                let source = self.lower_contract(&contract.node, contract.span)?;
                let eval: Eval = Arc::new(move |frame: &mut Frame| {
                    let value = inner(frame)?.resolve()?;
                    let contract = source.resolve(frame)?;
                    Ok(Value::Boolean(contract.accepts(&value)))
                });
                Ok(Lowered::new(eval, Contract::BOOLEAN))
            }
            Expr::Contract(contract) => match self.lower_contract(contract, span)? {
                ContractSource::Static(contract) => Ok(Lowered::constant(Value::Contract(contract))),
                dynamic => {
                    let eval: Eval = Arc::new(move |frame: &mut Frame| Ok(Value::Contract(dynamic.resolve(frame)?)));
                    Ok(Lowered::new(eval, Contract::Meta))
                }
            },
            Expr::Context { checked, body } => {
                let mode = ArithmeticMode::from_checked(*checked);
                self.lower_block(body, ScopeKind::Context(mode))
            }
            Expr::Fork {
                target,
                queue,
                body,
            } => self.lower_fork(target.as_deref(), queue.as_deref(), body, RoutineKind::Fork),
            Expr::Synchronized {
                target,
                queue,
                body,
            } => self.lower_fork(Some(target.as_ref()), queue.as_deref(), body, RoutineKind::Synchronizer),
            Expr::Await {
                handle,
                timeout,
                fallback,
            } => self.lower_await(handle, timeout, fallback),
            Expr::Unwrap(inner) => {
                let inner = self.lower_spanned(inner)?;
                let eval = inner.eval;
                Ok(Lowered::new(Arc::new(move |frame: &mut Frame| eval(frame)?.resolve()), inner.contract))
            }
        }
    }

    pub(super) fn lower_ident(&self, name: &str, span: Span) -> Result<Lowered> {
        let lexical = self.tree.mode();
        let name: Arc<str> = Arc::from(name);
        match self.tree.resolve(&name, span)? {
            Resolved::Local { hops, decl } => {
                let contract = declared_contract(&decl);
                let index = decl.index;
                let eval: Eval = Arc::new(move |frame: &mut Frame| {
                    let mode = frame.mode(lexical);
                    frame.env.slot(hops, index).read(&name, mode)
                });
                Ok(Lowered::new(eval, contract))
            }
            Resolved::Global => {
                let eval: Eval = Arc::new(move |frame: &mut Frame| {
                    let mode = frame.mode(lexical);
                    frame.state.globals.get(&name, mode)
                });
                Ok(Lowered::new(eval, Contract::Super))
            }
        }
    }

    fn lower_binary(&mut self, left: &Spanned<Expr>, op: BinOp, right: &Spanned<Expr>) -> Result<Lowered> {
        let left = self.lower_spanned(left)?;
        let right = self.lower_spanned(right)?;
        let contract = binary_contract(op, &left.contract, &right.contract);
        let (lhs, rhs) = (left.eval, right.eval);
        let lexical = self.tree.mode();

        let eval: Eval = match op {
            BinOp::And => Arc::new(move |frame: &mut Frame| {
                Ok(Value::Boolean(
                    lhs(frame)?.resolve()?.is_truthy() && rhs(frame)?.resolve()?.is_truthy(),
                ))
            }),
            BinOp::Or => Arc::new(move |frame: &mut Frame| {
                Ok(Value::Boolean(
                    lhs(frame)?.resolve()?.is_truthy() || rhs(frame)?.resolve()?.is_truthy(),
                ))
            }),
            _ => Arc::new(move |frame: &mut Frame| {
                let left = lhs(frame)?;
                let right = rhs(frame)?;
                binary_op(op, left, right, frame.mode(lexical))
            }),
        };
        Ok(Lowered::new(eval, contract))
    }

    fn lower_unary(&mut self, op: UnOp, expr: &Spanned<Expr>) -> Result<Lowered> {
        let inner = self.lower_spanned(expr)?;
        let contract = match op {
            UnOp::Not => Contract::BOOLEAN,
            UnOp::Neg if is_numeric(&inner.contract) => inner.contract.clone(),
            UnOp::Neg => Contract::Super,
        };
        let eval = inner.eval;
        let lexical = self.tree.mode();
        Ok(Lowered::new(
            Arc::new(move |frame: &mut Frame| {
                let value = eval(frame)?;
                unary_op(op, value, frame.mode(lexical))
            }),
            contract,
        ))
    }

    fn lower_if(
        &mut self,
        cond: &Spanned<Expr>,
        then_branch: &[Spanned<Stmt>],
        else_branch: Option<&Block>,
    ) -> Result<Lowered> {
        let cond = self.lower_spanned(cond)?.eval;
        let then_branch = self.lower_block(then_branch, ScopeKind::Generic)?;
        let else_branch = match else_branch {
            Some(block) => self.lower_block(block, ScopeKind::Generic)?,
            None => Lowered::void(),
        };
        let contract = union(&then_branch.contract, &else_branch.contract);
        let (then_eval, else_eval) = (then_branch.eval, else_branch.eval);
        let eval: Eval = Arc::new(move |frame: &mut Frame| {
            if cond(frame)?.resolve()?.is_truthy() {
                then_eval(frame)
            } else {
                else_eval(frame)
            }
        });
        Ok(Lowered::new(eval, contract))
    }

    fn lower_call(&mut self, callee: &Spanned<Expr>, args: &[Spanned<Expr>]) -> Result<Lowered> {
        let args = args
            .iter()
            .map(|arg| self.lower_spanned(arg))
            .collect::<Result<Vec<_>>>()?;

        if let Expr::Ident(name) = &callee.node {
            match self.tree.resolve(name, callee.span)? {
                Resolved::Local { hops, decl } => {
                    if let Some(info) = &decl.routine {
                        if info.arity != args.len() {
                            tracing::debug!(
                                routine = %name,
                                expected = info.arity,
                                given = args.len(),
                                "call arity differs from declaration"
                            );
                        } else if let Some(params) = &info.inline_params {
                            return Ok(self.inline_routine(name, hops, decl.index, params, info.ret.clone(), args));
                        }
                    }
                }
                Resolved::Global => {
                    if let Some(native) = self.inlinable_native(name, args.len()) {
                        return Ok(inline_native(native, args));
                    }
                }
            }
        }

        let callee = self.lower_spanned(callee)?;
        let contract = match &callee.contract {
            Contract::Function(signature) => signature.ret.clone(),
            _ => Contract::Super,
        };
        let callee = callee.eval;
        let args: Vec<Eval> = args.into_iter().map(|arg| arg.eval).collect();
        let eval: Eval = Arc::new(move |frame: &mut Frame| {
            let target = callee(frame)?;
            let values = eval_all(&args, frame)?;
            invoke(&target, values, frame)
        });
        Ok(Lowered::new(eval, contract))
    }

    /// Direct entry into a local inlinable routine. Arguments whose static
    /// contract already matches the parameter skip conversion.
    fn inline_routine(
        &self,
        name: &str,
        hops: usize,
        index: usize,
        params: &[Contract],
        ret: Contract,
        args: Vec<Lowered>,
    ) -> Lowered {
        let conversions: Vec<Option<Contract>> = params
            .iter()
            .zip(&args)
            .map(|(param, arg)| {
                let same = matches!(param, Contract::Super)
                    || self.cache.relationship(&arg.contract, param) == Relationship::Same;
                (!same).then(|| param.clone())
            })
            .collect();
        let args: Vec<Eval> = args.into_iter().map(|arg| arg.eval).collect();
        let name: Arc<str> = Arc::from(name);
        let lexical = self.tree.mode();

        let eval: Eval = Arc::new(move |frame: &mut Frame| {
            let routine = match frame.env.slot(hops, index).read(&name, frame.mode(lexical))? {
                Value::Routine(routine) => routine,
                other => return invoke(&other, eval_all(&args, frame)?, frame),
            };
            let mode = frame.mode(routine.mode);
            let mut values = Vec::with_capacity(args.len());
            for (arg, conversion) in args.iter().zip(&conversions) {
                let value = arg(frame)?;
                values.push(match conversion {
                    Some(contract) => convert(&value, contract, mode)?,
                    None => value,
                });
            }
            routine.enter(values, frame)
        });
        Lowered::new(eval, ret)
    }

    /// Host function bound at compile time: an immutable global marked
    /// inlinable whose arity matches the call
    fn inlinable_native(&self, name: &str, argc: usize) -> Option<Arc<NativeFunction>> {
        let slot = self.globals.slot(name)?;
        if !slot.is_immutable() {
            return None;
        }
        match slot.peek()? {
            Value::Native(native) if native.is_inlinable() && native.arity() == Some(argc) => Some(native),
            _ => None,
        }
    }

    fn lower_member(&mut self, object: &Spanned<Expr>, name: &str) -> Result<Lowered> {
        let object = self.lower_spanned(object)?;
        let contract = match &object.contract {
            Contract::Composite(members) => members.get(name).cloned().unwrap_or(Contract::Super),
            _ => Contract::Super,
        };
        let object = object.eval;
        let name: Arc<str> = Arc::from(name);
        let lexical = self.tree.mode();
        let eval: Eval = Arc::new(move |frame: &mut Frame| {
            let target = object(frame)?.resolve()?;
            member_value(&target, &name, frame.mode(lexical))
        });
        Ok(Lowered::new(eval, contract))
    }

    fn lower_index(&mut self, object: &Spanned<Expr>, index: &Spanned<Expr>) -> Result<Lowered> {
        let object = self.lower_spanned(object)?;
        let index = self.lower_spanned(index)?.eval;
        let contract = match &object.contract {
            Contract::Array { element, rank } => element_at_rank(element, *rank),
            _ => Contract::Super,
        };
        let object = object.eval;
        let lexical = self.tree.mode();
        let eval: Eval = Arc::new(move |frame: &mut Frame| {
            let target = object(frame)?.resolve()?;
            let key = index(frame)?.resolve()?;
            index_value(&target, &key, frame.mode(lexical))
        });
        Ok(Lowered::new(eval, contract))
    }

    fn lower_array(&mut self, items: &[Spanned<Expr>]) -> Result<Lowered> {
        let items = items
            .iter()
            .map(|item| self.lower_spanned(item))
            .collect::<Result<Vec<_>>>()?;
        let element = items
            .iter()
            .map(|item| item.contract.clone())
            .reduce(|acc, c| union(&acc, &c))
            .unwrap_or(Contract::Super);
        let contract = match element {
            Contract::Array { element, rank } => Contract::Array {
                element,
                rank: rank + 1,
            },
            other => Contract::array(other, 1),
        };
        let items: Vec<Eval> = items.into_iter().map(|item| item.eval).collect();
        let eval: Eval = Arc::new(move |frame: &mut Frame| Ok(Value::array(eval_all(&items, frame)?)));
        Ok(Lowered::new(eval, contract))
    }

    fn lower_object(&mut self, fields: &[FieldInit]) -> Result<Lowered> {
        let mut seen = BTreeSet::new();
        let mut lowered = Vec::with_capacity(fields.len());
        for field in fields {
            if !seen.insert(field.name.node.as_str()) {
                return Err(CompileError::duplicate(&field.name.node, field.name.span));
            }
            lowered.push((field.name.node.clone(), self.lower_spanned(&field.value)?));
        }
        let contract = Contract::composite(
            lowered
                .iter()
                .map(|(name, value)| (name.clone(), value.contract.clone())),
        );
        let fields: Vec<(String, Eval)> = lowered.into_iter().map(|(name, value)| (name, value.eval)).collect();
        let eval: Eval = Arc::new(move |frame: &mut Frame| {
            let object = ScriptObject::new();
            for (name, value) in &fields {
                object.define(name, value(frame)?, None);
            }
            Ok(Value::object(object))
        });
        Ok(Lowered::new(eval, contract))
    }

    fn lower_lambda(&mut self, lambda: &Lambda) -> Result<Lowered> {
        let signature = self.lower_signature(&lambda.params, lambda.ret.as_ref(), false)?;
        let template = self.lower_routine("lambda", signature, &lambda.params, &lambda.body)?;
        let contract = template.contract();
        let eval: Eval = Arc::new(move |frame: &mut Frame| Ok(Value::Routine(template.instantiate(frame)?)));
        Ok(Lowered::new(eval, contract))
    }

    fn lower_convert(&self, inner: Lowered, source: ContractSource) -> Lowered {
        let contract = source.or_super();
        let eval = inner.eval;
        let lexical = self.tree.mode();
        Lowered::new(
            Arc::new(move |frame: &mut Frame| {
                let value = eval(frame)?;
                let contract = source.resolve(frame)?;
                convert(&value, &contract, frame.mode(lexical))
            }),
            contract,
        )
    }
}

fn inline_native(native: Arc<NativeFunction>, args: Vec<Lowered>) -> Lowered {
    let args: Vec<Eval> = args.into_iter().map(|arg| arg.eval).collect();
    Lowered::new(
        Arc::new(move |frame: &mut Frame| {
            let values = eval_all(&args, frame)?;
            native.invoke(&values, frame)
        }),
        Contract::Super,
    )
}

/// Contract a read of `decl` is known to satisfy
fn declared_contract(decl: &Declaration) -> Contract {
    if decl.known.is_some() {
        return Contract::Meta;
    }
    if let Some(RoutineInfo {
        inline_params: Some(params),
        ret,
        ..
    }) = &decl.routine
    {
        return Contract::function(params.clone(), ret.clone());
    }
    decl.contract.clone().unwrap_or(Contract::Super)
}

fn is_numeric(contract: &Contract) -> bool {
    *contract == Contract::INTEGER || *contract == Contract::REAL
}

fn binary_contract(op: BinOp, left: &Contract, right: &Contract) -> Contract {
    match op {
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::And | BinOp::Or => {
            Contract::BOOLEAN
        }
        BinOp::Add if *left == Contract::STRING || *right == Contract::STRING => Contract::STRING,
        _ if *left == Contract::INTEGER && *right == Contract::INTEGER => Contract::INTEGER,
        _ if is_numeric(left) && is_numeric(right) => Contract::REAL,
        _ => Contract::Super,
    }
}

pub(crate) fn member_value(target: &Value, name: &str, mode: ArithmeticMode) -> InterpResult<Value> {
    match target {
        Value::Object(object) => object.get(name, mode),
        _ => Err(RuntimeError::missing_member(name)),
    }
}

pub(crate) fn index_value(target: &Value, key: &Value, mode: ArithmeticMode) -> InterpResult<Value> {
    match (target, key) {
        (Value::Array(items), Value::Integer(i)) => usize::try_from(*i)
            .ok()
            .and_then(|position| items.get(position))
            .cloned()
            .ok_or_else(|| RuntimeError::index_out_of_bounds(*i, items.len())),
        (Value::String(s), Value::Integer(i)) => usize::try_from(*i)
            .ok()
            .and_then(|position| s.chars().nth(position))
            .map(|c| Value::string(c.encode_utf8(&mut [0; 4])))
            .ok_or_else(|| RuntimeError::index_out_of_bounds(*i, s.chars().count())),
        (Value::Object(object), Value::String(name)) => object.get(name, mode),
        _ => Err(RuntimeError::type_mismatch("[]", target, key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_contracts() {
        assert_eq!(binary_contract(BinOp::Add, &Contract::INTEGER, &Contract::INTEGER), Contract::INTEGER);
        assert_eq!(binary_contract(BinOp::Mul, &Contract::INTEGER, &Contract::REAL), Contract::REAL);
        assert_eq!(binary_contract(BinOp::Add, &Contract::STRING, &Contract::Super), Contract::STRING);
        assert_eq!(binary_contract(BinOp::Lt, &Contract::Super, &Contract::Super), Contract::BOOLEAN);
        assert_eq!(binary_contract(BinOp::Sub, &Contract::BOOLEAN, &Contract::INTEGER), Contract::Super);
    }

    #[test]
    fn test_index_value() {
        let mode = ArithmeticMode::Checked;
        let items = Value::array(vec![Value::Integer(4), Value::Integer(5)]);
        assert_eq!(index_value(&items, &Value::Integer(1), mode).unwrap(), Value::Integer(5));
        assert!(index_value(&items, &Value::Integer(-1), mode).is_err());
        assert!(index_value(&items, &Value::Integer(2), mode).is_err());
        assert_eq!(index_value(&Value::string("héllo"), &Value::Integer(1), mode).unwrap(), Value::string("é"));
        assert!(index_value(&Value::Integer(3), &Value::Integer(0), mode).is_err());
    }

    #[test]
    fn test_member_of_non_object() {
        let err = member_value(&Value::Integer(1), "x", ArithmeticMode::Checked).unwrap_err();
        assert_eq!(err.kind, crate::interp::ErrorKind::MissingMember);
    }
}
