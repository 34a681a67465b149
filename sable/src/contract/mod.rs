//! Contract algebra
//!
//! A contract is a structural description of the values an expression, slot
//! or parameter may hold. Contracts are immutable and cheap to clone; every
//! compound variant shares its parts behind an `Arc`.
//!
//! The algebra has four entry points:
//! - [`relationship`] orders two contracts (Same / Superset / Subset / None),
//! - [`union`] and [`intersect`] build new contracts,
//! - [`convert`] coerces a value to a contract under a checked/unchecked mode.

mod algebra;
mod cache;
mod convert;
mod relation;

pub use algebra::{intersect, union};
pub use cache::RelationshipCache;
pub use convert::{convert, ArithmeticMode};
pub use relation::{relationship, Relationship};

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::interp::{ScriptObject, Value};

/// Built-in scalar contracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Integer,
    Real,
    Boolean,
    String,
    Void,
}

/// Parameter and return contracts of a routine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionSignature {
    pub params: Vec<Contract>,
    pub ret: Contract,
}

/// User-defined contract compared only by constructor identity
#[derive(Debug)]
pub struct CustomContract {
    name: String,
    id: u64,
}

static NEXT_CUSTOM_ID: AtomicU64 = AtomicU64::new(1);

impl CustomContract {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Structural type descriptor
#[derive(Debug, Clone)]
pub enum Contract {
    Primitive(Primitive),
    Function(Arc<FunctionSignature>),
    /// Homogeneous array; `rank` counts nested dimensions (1 = flat)
    Array { element: Arc<Contract>, rank: usize },
    /// Deduplicated literal members
    FiniteSet(Arc<[Value]>),
    Product(Arc<[Contract]>),
    Composite(Arc<BTreeMap<String, Contract>>),
    Custom(Arc<CustomContract>),
    /// Accepts every value except contracts themselves
    Super,
    /// The contract of contracts
    Meta,
}

impl Contract {
    pub const INTEGER: Contract = Contract::Primitive(Primitive::Integer);
    pub const REAL: Contract = Contract::Primitive(Primitive::Real);
    pub const BOOLEAN: Contract = Contract::Primitive(Primitive::Boolean);
    pub const STRING: Contract = Contract::Primitive(Primitive::String);
    pub const VOID: Contract = Contract::Primitive(Primitive::Void);

    pub fn array(element: Contract, rank: usize) -> Self {
        Contract::Array {
            element: Arc::new(element),
            rank: rank.max(1),
        }
    }

    /// Finite set contract; duplicate members are dropped
    pub fn set(members: impl IntoIterator<Item = Value>) -> Self {
        let mut unique: Vec<Value> = Vec::new();
        for member in members {
            if !unique.iter().any(|m| m.strict_eq(&member)) {
                unique.push(member);
            }
        }
        Contract::FiniteSet(unique.into())
    }

    pub fn product(parts: impl IntoIterator<Item = Contract>) -> Self {
        Contract::Product(parts.into_iter().collect::<Vec<_>>().into())
    }

    pub fn composite<S: Into<String>>(members: impl IntoIterator<Item = (S, Contract)>) -> Self {
        Contract::Composite(Arc::new(
            members.into_iter().map(|(n, c)| (n.into(), c)).collect(),
        ))
    }

    pub fn function(params: Vec<Contract>, ret: Contract) -> Self {
        Contract::Function(Arc::new(FunctionSignature { params, ret }))
    }

    /// A fresh custom contract. Two calls with the same name are unrelated.
    pub fn custom(name: impl Into<String>) -> Self {
        Contract::Custom(Arc::new(CustomContract {
            name: name.into(),
            id: NEXT_CUSTOM_ID.fetch_add(1, Ordering::Relaxed),
        }))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Contract::Primitive(Primitive::Void))
    }

    /// Value produced when void is converted to this contract
    pub fn default_value(&self) -> Value {
        match self {
            Contract::Primitive(Primitive::Integer) => Value::Integer(0),
            Contract::Primitive(Primitive::Real) => Value::Real(0.0),
            Contract::Primitive(Primitive::Boolean) => Value::Boolean(false),
            Contract::Primitive(Primitive::String) => Value::string(""),
            Contract::Array { .. } => Value::array(Vec::new()),
            Contract::FiniteSet(members) => members.first().cloned().unwrap_or(Value::Void),
            Contract::Product(parts) => {
                Value::array(parts.iter().map(Contract::default_value).collect())
            }
            Contract::Composite(members) => {
                let object = ScriptObject::new();
                for (name, contract) in members.iter() {
                    object.define(name, contract.default_value(), Some(contract.clone()));
                }
                Value::Object(Arc::new(object))
            }
            Contract::Meta => Value::Contract(Contract::VOID),
            Contract::Primitive(Primitive::Void)
            | Contract::Function(_)
            | Contract::Custom(_)
            | Contract::Super => Value::Void,
        }
    }

    /// Conformance test: does `value` already satisfy this contract?
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Contract::Super, Value::Contract(_)) => false,
            (Contract::Super, _) => true,
            (Contract::Meta, Value::Contract(_)) => true,
            (Contract::Primitive(p), v) => match (p, v) {
                (Primitive::Void, Value::Void) => true,
                (Primitive::Integer, Value::Integer(_)) => true,
                (Primitive::Real, Value::Real(_) | Value::Integer(_)) => true,
                (Primitive::Boolean, Value::Boolean(_)) => true,
                (Primitive::String, Value::String(_)) => true,
                _ => false,
            },
            (Contract::Array { element, rank }, Value::Array(items)) => {
                let inner = element_at_rank(element, *rank);
                items.iter().all(|item| inner.accepts(item))
            }
            (Contract::FiniteSet(members), v) => members.iter().any(|m| m.strict_eq(v)),
            (Contract::Product(parts), Value::Array(items)) => {
                parts.len() == items.len() && parts.iter().zip(items.iter()).all(|(c, v)| c.accepts(v))
            }
            (Contract::Composite(members), Value::Object(object)) => {
                members.iter().all(|(name, contract)| {
                    object
                        .peek(name)
                        .is_some_and(|member| contract.accepts(&member))
                })
            }
            (Contract::Function(sig), Value::Native(native)) => {
                native.arity().is_none_or(|n| n == sig.params.len())
            }
            (Contract::Function(sig), Value::Routine(routine)) => {
                let own = Contract::Function(Arc::new(routine.signature()));
                matches!(
                    relationship(&own, &Contract::Function(Arc::clone(sig))),
                    Relationship::Same | Relationship::Subset
                )
            }
            (Contract::Custom(custom), Value::Object(object)) => object
                .constructor()
                .is_some_and(|ctor| ctor.id == custom.id),
            _ => false,
        }
    }

    /// Narrowest contract describing a value (the `contractOf` capability)
    pub fn of(value: &Value) -> Contract {
        match value {
            Value::Void => Contract::VOID,
            Value::Integer(_) => Contract::INTEGER,
            Value::Real(_) => Contract::REAL,
            Value::Boolean(_) => Contract::BOOLEAN,
            Value::String(_) => Contract::STRING,
            Value::Array(items) => {
                let element = items
                    .iter()
                    .map(Contract::of)
                    .reduce(|acc, c| union(&acc, &c))
                    .unwrap_or(Contract::Super);
                match element {
                    Contract::Array { element, rank } => Contract::Array {
                        element,
                        rank: rank + 1,
                    },
                    other => Contract::array(other, 1),
                }
            }
            Value::Object(object) => match object.constructor() {
                Some(ctor) => Contract::Custom(Arc::clone(ctor)),
                None => Contract::composite(
                    object
                        .members()
                        .into_iter()
                        .map(|(name, member)| (name, Contract::of(&member))),
                ),
            },
            Value::Native(native) => Contract::function(
                vec![Contract::Super; native.arity().unwrap_or(0)],
                Contract::Super,
            ),
            Value::Routine(routine) => Contract::Function(Arc::new(routine.signature())),
            Value::Contract(_) => Contract::Meta,
            Value::Proxy(_) | Value::Queue(_) => Contract::Super,
        }
    }
}

/// Contract of the elements one dimension down
pub(crate) fn element_at_rank(element: &Arc<Contract>, rank: usize) -> Contract {
    if rank > 1 {
        Contract::Array {
            element: Arc::clone(element),
            rank: rank - 1,
        }
    } else {
        element.as_ref().clone()
    }
}

impl PartialEq for Contract {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Contract::Primitive(a), Contract::Primitive(b)) => a == b,
            (Contract::Function(a), Contract::Function(b)) => a == b,
            (
                Contract::Array { element: e1, rank: r1 },
                Contract::Array { element: e2, rank: r2 },
            ) => r1 == r2 && e1 == e2,
            (Contract::FiniteSet(a), Contract::FiniteSet(b)) => {
                a.len() == b.len() && a.iter().all(|m| b.iter().any(|n| m.strict_eq(n)))
            }
            (Contract::Product(a), Contract::Product(b)) => a == b,
            (Contract::Composite(a), Contract::Composite(b)) => a == b,
            (Contract::Custom(a), Contract::Custom(b)) => a.id == b.id,
            (Contract::Super, Contract::Super) | (Contract::Meta, Contract::Meta) => true,
            _ => false,
        }
    }
}

impl Eq for Contract {}

impl Hash for Contract {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Contract::Primitive(p) => p.hash(state),
            Contract::Function(sig) => sig.hash(state),
            Contract::Array { element, rank } => {
                element.hash(state);
                rank.hash(state);
            }
            Contract::FiniteSet(members) => {
                // Order-insensitive, matching `eq`
                let mut combined = 0u64;
                for member in members.iter() {
                    combined ^= member.fingerprint();
                }
                members.len().hash(state);
                combined.hash(state);
            }
            Contract::Product(parts) => parts.hash(state),
            Contract::Composite(members) => members.hash(state),
            Contract::Custom(custom) => custom.id.hash(state),
            Contract::Super | Contract::Meta => {}
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Primitive::Integer => "integer",
            Primitive::Real => "real",
            Primitive::Boolean => "boolean",
            Primitive::String => "string",
            Primitive::Void => "void",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contract::Primitive(p) => write!(f, "{p}"),
            Contract::Function(sig) => {
                write!(f, "fn(")?;
                write_list(f, sig.params.iter())?;
                write!(f, ") -> {}", sig.ret)
            }
            Contract::Array { element, rank } => {
                write!(f, "{element}[{}]", ",".repeat(rank.saturating_sub(1)))
            }
            Contract::FiniteSet(members) => {
                write!(f, "set{{")?;
                write_list(f, members.iter())?;
                write!(f, "}}")
            }
            Contract::Product(parts) => {
                write!(f, "(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " * ")?;
                    }
                    write!(f, "{part}")?;
                }
                write!(f, ")")
            }
            Contract::Composite(members) => {
                write!(f, "{{")?;
                for (i, (name, contract)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {contract}")?;
                }
                write!(f, "}}")
            }
            Contract::Custom(custom) => f.write_str(&custom.name),
            Contract::Super => f.write_str("super"),
            Contract::Meta => f.write_str("meta"),
        }
    }
}

fn write_list<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = T>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
