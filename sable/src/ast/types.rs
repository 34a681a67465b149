//! Contract syntax

use serde::{Deserialize, Serialize};

use super::Literal;

/// Contract as written in source, before lowering to [`crate::contract::Contract`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContractExpr {
    Integer,
    Real,
    Boolean,
    String,
    Void,
    Super,
    Meta,
    Array {
        element: Box<ContractExpr>,
        rank: usize,
    },
    /// Finite set of literal members
    Set(Vec<Literal>),
    /// Cartesian product (tuple)
    Product(Vec<ContractExpr>),
    /// Named members
    Composite(Vec<MemberContract>),
    Function {
        params: Vec<ContractExpr>,
        ret: Box<ContractExpr>,
    },
    /// Identifier evaluating to a contract value at run time (custom contracts)
    Named(String),
}

/// One member of a composite contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberContract {
    pub name: String,
    pub contract: ContractExpr,
}

impl ContractExpr {
    /// True when the contract can be lowered without evaluating anything
    pub fn is_static(&self) -> bool {
        match self {
            ContractExpr::Named(_) => false,
            ContractExpr::Array { element, .. } => element.is_static(),
            ContractExpr::Product(parts) => parts.iter().all(ContractExpr::is_static),
            ContractExpr::Composite(members) => members.iter().all(|m| m.contract.is_static()),
            ContractExpr::Function { params, ret } => {
                params.iter().all(ContractExpr::is_static) && ret.is_static()
            }
            _ => true,
        }
    }
}
