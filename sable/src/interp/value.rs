//! Runtime values

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::{InterpResult, NativeFunction, Routine, ScriptObject};
use crate::contract::Contract;
use crate::queue::{WorkItemHandle, WorkItemQueue};

/// Runtime value.
///
/// Scalars and arrays have value semantics (arrays are copy-on-write);
/// objects, routines, proxies and queues are shared references.
#[derive(Clone)]
pub enum Value {
    Void,
    Integer(i64),
    Real(f64),
    Boolean(bool),
    String(Arc<str>),
    Array(Arc<Vec<Value>>),
    Object(Arc<ScriptObject>),
    /// Routine implemented by the host
    Native(Arc<NativeFunction>),
    /// Routine compiled from script
    Routine(Arc<Routine>),
    /// A contract used as a value
    Contract(Contract),
    /// Stand-in for the result of a fork or synchronized body
    Proxy(WorkItemHandle),
    Queue(Arc<dyn WorkItemQueue>),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::String(Arc::from(s))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }

    pub fn object(object: ScriptObject) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Name of the value kind for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Native(_) | Value::Routine(_) => "routine",
            Value::Contract(_) => "contract",
            Value::Proxy(_) => "proxy",
            Value::Queue(_) => "queue",
        }
    }

    /// Truthiness used by conditions
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Void => false,
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Real(x) => *x != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(x) => Some(*x),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Replace a proxy by the value it stands for, blocking until the work
    /// item resolves. A faulted item re-raises its fault here. Proxies that
    /// resolve to proxies are followed.
    pub fn resolve(self) -> InterpResult<Value> {
        let mut value = self;
        while let Value::Proxy(handle) = value {
            value = handle.unwrap()?;
        }
        Ok(value)
    }

    /// Identity-or-value equality without numeric coercion
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits() || a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                // Sequential element comparison
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.strict_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(a, b),
            (Value::Routine(a), Value::Routine(b)) => Arc::ptr_eq(a, b),
            (Value::Contract(a), Value::Contract(b)) => a == b,
            (Value::Proxy(a), Value::Proxy(b)) => a.ptr_eq(b),
            (Value::Queue(a), Value::Queue(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }

    /// Equality used by `==`: integers and reals compare numerically
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Real(b)) | (Value::Real(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.loose_eq(y))
            }
            _ => self.strict_eq(other),
        }
    }

    /// Hash consistent with [`Value::strict_eq`]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash_into(&mut hasher);
        hasher.finish()
    }

    fn hash_into<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Void => {}
            Value::Integer(n) => n.hash(state),
            Value::Real(x) => {
                // -0.0 == 0.0 under strict_eq
                let x = if *x == 0.0 { 0.0 } else { *x };
                x.to_bits().hash(state)
            }
            Value::Boolean(b) => b.hash(state),
            Value::String(s) => s.hash(state),
            Value::Array(items) => {
                items.len().hash(state);
                for item in items.iter() {
                    item.hash_into(state);
                }
            }
            Value::Object(o) => (Arc::as_ptr(o) as usize).hash(state),
            Value::Native(n) => (Arc::as_ptr(n) as usize).hash(state),
            Value::Routine(r) => (Arc::as_ptr(r) as usize).hash(state),
            Value::Contract(c) => c.hash(state),
            Value::Proxy(h) => h.address().hash(state),
            Value::Queue(q) => (Arc::as_ptr(q) as *const () as usize).hash(state),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Real(x) => write!(f, "{x}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(object) => {
                if let Some(ctor) = object.constructor() {
                    write!(f, "{} ", ctor.name())?;
                }
                write!(f, "{{")?;
                for (i, (name, member)) in object.members().into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {member}")?;
                }
                write!(f, "}}")
            }
            Value::Native(native) => write!(f, "<native {}>", native.name()),
            Value::Routine(routine) => write!(f, "<routine {}>", routine.name()),
            Value::Contract(contract) => write!(f, "{contract}"),
            Value::Proxy(handle) => write!(f, "<proxy {:?}>", handle.status()),
            Value::Queue(queue) => write!(f, "<queue {}>", queue.name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            Value::Real(x) => write!(f, "{x:?}"),
            other => write!(f, "{other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Real(3.5).to_string(), "3.5");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::Void.to_string(), "void");
        let nested = Value::array(vec![Value::Integer(1), Value::array(vec![Value::string("a")])]);
        insta::assert_snapshot!(nested.to_string(), @"[1, [a]]");
    }

    #[test]
    fn test_value_truthy() {
        assert!(Value::Boolean(true).is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Integer(1).is_truthy());
        assert!(!Value::Integer(0).is_truthy());
        assert!(!Value::Void.is_truthy());
    }

    #[test]
    fn test_loose_vs_strict_equality() {
        assert!(Value::Integer(2).loose_eq(&Value::Real(2.0)));
        assert!(!Value::Integer(2).strict_eq(&Value::Real(2.0)));
    }

    #[test]
    fn test_objects_compare_by_identity() {
        let a = Value::object(ScriptObject::new());
        let b = Value::object(ScriptObject::new());
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_follows_equality() {
        let a = Value::array(vec![Value::Integer(1), Value::string("x")]);
        let b = Value::array(vec![Value::Integer(1), Value::string("x")]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(Value::Real(0.0).fingerprint(), Value::Real(-0.0).fingerprint());
    }
}
