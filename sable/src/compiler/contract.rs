//! Lowering of contract syntax
//!
//! Most contracts are known at compile time. A contract that names a
//! binding (`Named`) is resolved statically when the binding is a constant
//! initialized with a contract literal or an immutable global contract, and
//! evaluated at run time otherwise. Compound contracts with a dynamic part
//! become dynamic as a whole.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::scope::Resolved;
use super::Compiler;
use crate::ast::{ContractExpr, Literal, Span};
use crate::contract::Contract;
use crate::error::{CompileError, Result};
use crate::interp::{Frame, InterpResult, RuntimeError, Value};

type ContractEval = Arc<dyn Fn(&mut Frame) -> InterpResult<Contract> + Send + Sync>;

/// A lowered contract
#[derive(Clone)]
pub(crate) enum ContractSource {
    Static(Contract),
    Dynamic(ContractEval),
}

impl ContractSource {
    pub fn resolve(&self, frame: &mut Frame) -> InterpResult<Contract> {
        match self {
            ContractSource::Static(contract) => Ok(contract.clone()),
            ContractSource::Dynamic(eval) => eval(frame),
        }
    }

    pub fn as_static(&self) -> Option<&Contract> {
        match self {
            ContractSource::Static(contract) => Some(contract),
            ContractSource::Dynamic(_) => None,
        }
    }

    /// Static contract, or Super when only known at run time
    pub fn or_super(&self) -> Contract {
        self.as_static().cloned().unwrap_or(Contract::Super)
    }

    /// Build a compound contract from its parts
    fn combine(
        parts: Vec<ContractSource>,
        build: impl Fn(Vec<Contract>) -> Contract + Send + Sync + 'static,
    ) -> ContractSource {
        let known: Option<Vec<Contract>> = parts.iter().map(|p| p.as_static().cloned()).collect();
        if let Some(known) = known {
            return ContractSource::Static(build(known));
        }
        ContractSource::Dynamic(Arc::new(move |frame: &mut Frame| {
            let resolved = parts
                .iter()
                .map(|part| part.resolve(frame))
                .collect::<InterpResult<Vec<_>>>()?;
            Ok(build(resolved))
        }))
    }
}

pub(crate) fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Void => Value::Void,
        Literal::Integer(n) => Value::Integer(*n),
        Literal::Real(x) => Value::Real(*x),
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::String(s) => Value::string(s),
    }
}

/// Run-time check that a binding used as a contract holds one
fn expect_contract(value: Value) -> InterpResult<Contract> {
    match value.resolve()? {
        Value::Contract(contract) => Ok(contract),
        other => Err(RuntimeError::contract_binding(&other, &Contract::Meta)),
    }
}

impl Compiler {
    pub(super) fn lower_contract(&self, expr: &ContractExpr, span: Span) -> Result<ContractSource> {
        let source = match expr {
            ContractExpr::Integer => ContractSource::Static(Contract::INTEGER),
            ContractExpr::Real => ContractSource::Static(Contract::REAL),
            ContractExpr::Boolean => ContractSource::Static(Contract::BOOLEAN),
            ContractExpr::String => ContractSource::Static(Contract::STRING),
            ContractExpr::Void => ContractSource::Static(Contract::VOID),
            ContractExpr::Super => ContractSource::Static(Contract::Super),
            ContractExpr::Meta => ContractSource::Static(Contract::Meta),
            ContractExpr::Array { element, rank } => {
                if *rank == 0 {
                    return Err(CompileError::invalid_contract("array rank must be at least 1", span));
                }
                let rank = *rank;
                let element = self.lower_contract(element, span)?;
                ContractSource::combine(vec![element], move |mut parts| {
                    Contract::array(parts.pop().unwrap_or(Contract::Super), rank)
                })
            }
            ContractExpr::Set(members) => {
                if members.is_empty() {
                    return Err(CompileError::invalid_contract("a set contract needs members", span));
                }
                ContractSource::Static(Contract::set(members.iter().map(literal_value)))
            }
            ContractExpr::Product(parts) => {
                let parts = parts
                    .iter()
                    .map(|part| self.lower_contract(part, span))
                    .collect::<Result<Vec<_>>>()?;
                ContractSource::combine(parts, Contract::product)
            }
            ContractExpr::Composite(members) => {
                let mut seen = BTreeSet::new();
                let mut names = Vec::with_capacity(members.len());
                let mut parts = Vec::with_capacity(members.len());
                for member in members {
                    if !seen.insert(member.name.as_str()) {
                        return Err(CompileError::invalid_contract(
                            format!("member `{}` appears twice", member.name),
                            span,
                        ));
                    }
                    names.push(member.name.clone());
                    parts.push(self.lower_contract(&member.contract, span)?);
                }
                ContractSource::combine(parts, move |parts| {
                    Contract::composite(names.iter().cloned().zip(parts))
                })
            }
            ContractExpr::Function { params, ret } => {
                let mut parts = params
                    .iter()
                    .map(|param| self.lower_contract(param, span))
                    .collect::<Result<Vec<_>>>()?;
                parts.push(self.lower_contract(ret, span)?);
                ContractSource::combine(parts, |mut parts| {
                    let ret = parts.pop().unwrap_or(Contract::Super);
                    Contract::function(parts, ret)
                })
            }
            ContractExpr::Named(name) => self.lower_named_contract(name, span)?,
        };
        Ok(source)
    }

    fn lower_named_contract(&self, name: &str, span: Span) -> Result<ContractSource> {
        let lexical = self.tree.mode();
        let name: Arc<str> = Arc::from(name);
        match self.tree.resolve(&name, span)? {
            Resolved::Local { hops, decl } => match decl.known {
                Some(contract) => Ok(ContractSource::Static(contract)),
                None => {
                    let index = decl.index;
                    Ok(ContractSource::Dynamic(Arc::new(move |frame: &mut Frame| {
                        let mode = frame.mode(lexical);
                        expect_contract(frame.env.slot(hops, index).read(&name, mode)?)
                    })))
                }
            },
            Resolved::Global => {
                let fixed = self
                    .globals
                    .slot(&name)
                    .filter(|slot| slot.is_immutable())
                    .and_then(|slot| slot.peek());
                if let Some(Value::Contract(contract)) = fixed {
                    return Ok(ContractSource::Static(contract));
                }
                Ok(ContractSource::Dynamic(Arc::new(move |frame: &mut Frame| {
                    let mode = frame.mode(lexical);
                    expect_contract(frame.state.globals.get(&name, mode)?)
                })))
            }
        }
    }
}
