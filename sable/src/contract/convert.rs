//! Value conversion

use std::sync::Arc;

use super::{element_at_rank, Contract, Primitive};
use crate::interp::{InterpResult, RuntimeError, ScriptObject, Value};

/// Arithmetic and conversion semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArithmeticMode {
    /// Lossy narrowing and overflow raise errors
    #[default]
    Checked,
    /// Narrowing truncates, overflow wraps, failed bindings fall back to defaults
    Unchecked,
}

impl ArithmeticMode {
    pub fn is_checked(self) -> bool {
        self == ArithmeticMode::Checked
    }

    pub fn from_checked(checked: bool) -> Self {
        if checked {
            ArithmeticMode::Checked
        } else {
            ArithmeticMode::Unchecked
        }
    }
}

/// Convert `value` so that it satisfies `contract`.
///
/// Converting to void always succeeds and discards the value. In unchecked
/// mode a conversion with no path yields the contract's default value instead
/// of a binding failure.
pub fn convert(value: &Value, contract: &Contract, mode: ArithmeticMode) -> InterpResult<Value> {
    match contract {
        Contract::Primitive(Primitive::Void) => return Ok(Value::Void),
        Contract::Super => return Ok(value.clone()),
        _ => {}
    }

    let value = value.clone().resolve()?;
    match convert_resolved(&value, contract, mode) {
        Ok(converted) => Ok(converted),
        Err(err) if err.is_binding_failure() && !mode.is_checked() => Ok(contract.default_value()),
        Err(err) => Err(err),
    }
}

fn convert_resolved(value: &Value, contract: &Contract, mode: ArithmeticMode) -> InterpResult<Value> {
    if matches!(value, Value::Void) {
        return Ok(contract.default_value());
    }
    let fail = || Err(RuntimeError::contract_binding(value, contract));

    match contract {
        Contract::Primitive(p) => match (p, value) {
            (Primitive::Integer, Value::Integer(_)) => Ok(value.clone()),
            (Primitive::Integer, Value::Boolean(b)) => Ok(Value::Integer(i64::from(*b))),
            (Primitive::Integer, Value::Real(x)) => real_to_integer(*x, mode),
            (Primitive::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(n) => Ok(Value::Integer(n)),
                Err(_) => fail(),
            },
            (Primitive::Real, Value::Real(_)) => Ok(value.clone()),
            (Primitive::Real, Value::Integer(n)) => Ok(Value::Real(*n as f64)),
            (Primitive::Real, Value::Boolean(b)) => Ok(Value::Real(if *b { 1.0 } else { 0.0 })),
            (Primitive::Real, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(x) => Ok(Value::Real(x)),
                Err(_) => fail(),
            },
            (Primitive::Boolean, Value::Boolean(_)) => Ok(value.clone()),
            (Primitive::Boolean, Value::Integer(n)) => Ok(Value::Boolean(*n != 0)),
            (Primitive::Boolean, Value::Real(x)) => Ok(Value::Boolean(*x != 0.0)),
            (Primitive::Boolean, Value::String(s)) => match s.trim() {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => fail(),
            },
            (Primitive::String, Value::String(_)) => Ok(value.clone()),
            (Primitive::String, Value::Integer(_) | Value::Real(_) | Value::Boolean(_)) => {
                Ok(Value::string(&value.to_string()))
            }
            _ => fail(),
        },
        Contract::Array { element, rank } => match value {
            Value::Array(items) => {
                let inner = element_at_rank(element, *rank);
                let converted = items
                    .iter()
                    .map(|item| convert(item, &inner, mode))
                    .collect::<InterpResult<Vec<_>>>()?;
                Ok(Value::array(converted))
            }
            _ => fail(),
        },
        Contract::FiniteSet(members) => {
            if let Some(member) = members.iter().find(|m| m.loose_eq(value)) {
                Ok(member.clone())
            } else {
                fail()
            }
        }
        Contract::Product(parts) => match value {
            Value::Array(items) if items.len() == parts.len() => {
                let converted = parts
                    .iter()
                    .zip(items.iter())
                    .map(|(part, item)| convert(item, part, mode))
                    .collect::<InterpResult<Vec<_>>>()?;
                Ok(Value::array(converted))
            }
            _ => fail(),
        },
        Contract::Composite(members) => match value {
            Value::Object(object) => {
                if contract.accepts(value) {
                    return Ok(value.clone());
                }
                // Members need coercion: bind a converted copy
                let copy = ScriptObject::new();
                for (name, member) in object.members() {
                    copy.define(&name, member, None);
                }
                for (name, member_contract) in members.iter() {
                    let Some(current) = object.peek(name) else {
                        return Err(RuntimeError::missing_member(name));
                    };
                    let converted = convert(&current, member_contract, mode)?;
                    copy.define(name, converted, Some(member_contract.clone()));
                }
                Ok(Value::Object(Arc::new(copy)))
            }
            _ => fail(),
        },
        Contract::Function(_) => match value {
            Value::Native(_) | Value::Routine(_) if contract.accepts(value) => Ok(value.clone()),
            _ => fail(),
        },
        Contract::Custom(_) | Contract::Meta => {
            if contract.accepts(value) {
                Ok(value.clone())
            } else {
                fail()
            }
        }
        Contract::Super => Ok(value.clone()),
    }
}

fn real_to_integer(x: f64, mode: ArithmeticMode) -> InterpResult<Value> {
    let truncated = x.trunc();
    // i64::MAX is not representable as f64; 2^63 is the first value out of range
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if mode.is_checked() {
        if !truncated.is_finite() || truncated >= LIMIT || truncated < -LIMIT {
            return Err(RuntimeError::overflow(format!(
                "real {x} does not fit in integer"
            )));
        }
        Ok(Value::Integer(truncated as i64))
    } else if truncated.is_nan() {
        Ok(Value::Integer(0))
    } else {
        // Wrap modulo 2^64 through the wider integer type
        Ok(Value::Integer(truncated as i128 as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::ErrorKind;

    const CHECKED: ArithmeticMode = ArithmeticMode::Checked;
    const UNCHECKED: ArithmeticMode = ArithmeticMode::Unchecked;

    #[test]
    fn test_boolean_to_integer() {
        assert_eq!(convert(&Value::Boolean(true), &Contract::INTEGER, CHECKED).unwrap(), Value::Integer(1));
    }

    #[test]
    fn test_real_truncates_in_checked_mode() {
        assert_eq!(convert(&Value::Real(1.9), &Contract::INTEGER, CHECKED).unwrap(), Value::Integer(1));
        assert_eq!(convert(&Value::Real(-1.9), &Contract::INTEGER, CHECKED).unwrap(), Value::Integer(-1));
    }

    #[test]
    fn test_out_of_range_real() {
        let err = convert(&Value::Real(1e30), &Contract::INTEGER, CHECKED).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Overflow);
        let wrapped = convert(&Value::Real(1e30), &Contract::INTEGER, UNCHECKED).unwrap();
        assert!(matches!(wrapped, Value::Integer(_)));
    }

    #[test]
    fn test_void_target_discards() {
        let object = Value::Object(Arc::new(ScriptObject::new()));
        assert_eq!(convert(&object, &Contract::VOID, CHECKED).unwrap(), Value::Void);
    }

    #[test]
    fn test_void_becomes_default() {
        assert_eq!(convert(&Value::Void, &Contract::REAL, CHECKED).unwrap(), Value::Real(0.0));
    }

    #[test]
    fn test_binding_failure_and_unchecked_fallback() {
        let err = convert(&Value::string("abc"), &Contract::INTEGER, CHECKED).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ContractBinding);
        let fallback = convert(&Value::string("abc"), &Contract::INTEGER, UNCHECKED).unwrap();
        assert_eq!(fallback, Value::Integer(0));
    }

    #[test]
    fn test_array_elements_convert() {
        let reals = Value::array(vec![Value::Real(1.5), Value::Boolean(true)]);
        let ints = convert(&reals, &Contract::array(Contract::INTEGER, 1), CHECKED).unwrap();
        assert_eq!(ints, Value::array(vec![Value::Integer(1), Value::Integer(1)]));
    }

    #[test]
    fn test_composite_conversion() {
        let object = ScriptObject::new();
        object.define("x", Value::Real(2.5), None);
        object.define("label", Value::string("p"), None);
        let value = Value::Object(Arc::new(object));

        let target = Contract::composite([("x", Contract::INTEGER)]);
        let converted = convert(&value, &target, CHECKED).unwrap();
        assert!(target.accepts(&converted));

        let missing = Contract::composite([("y", Contract::INTEGER)]);
        let err = convert(&value, &missing, CHECKED).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingMember);
    }

    #[test]
    fn test_set_membership() {
        let digits = Contract::set([Value::Integer(1), Value::Integer(2)]);
        assert_eq!(convert(&Value::Real(2.0), &digits, CHECKED).unwrap(), Value::Integer(2));
        assert!(convert(&Value::Integer(5), &digits, CHECKED).is_err());
    }
}
