//! Operator semantics over runtime values

use std::cmp::Ordering;

use super::{InterpResult, RuntimeError, Value};
use crate::ast::{BinOp, UnOp};
use crate::contract::ArithmeticMode;

/// Apply a binary operator. Proxies are resolved first.
///
/// Integer arithmetic raises Overflow in checked mode and wraps in
/// unchecked mode. Mixed integer/real operands promote to real.
pub fn binary_op(op: BinOp, left: Value, right: Value, mode: ArithmeticMode) -> InterpResult<Value> {
    let left = left.resolve()?;
    let right = right.resolve()?;

    match op {
        BinOp::Eq => return Ok(Value::Boolean(left.loose_eq(&right))),
        BinOp::Ne => return Ok(Value::Boolean(!left.loose_eq(&right))),
        BinOp::And => return Ok(Value::Boolean(left.is_truthy() && right.is_truthy())),
        BinOp::Or => return Ok(Value::Boolean(left.is_truthy() || right.is_truthy())),
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => return compare(op, &left, &right),
        _ => {}
    }

    match (&left, &right) {
        (Value::Integer(a), Value::Integer(b)) => integer_op(op, *a, *b, mode),
        (Value::Integer(_) | Value::Real(_), Value::Integer(_) | Value::Real(_)) => {
            let (Some(a), Some(b)) = (left.as_real(), right.as_real()) else {
                return Err(RuntimeError::type_mismatch(&op.to_string(), &left, &right));
            };
            real_op(op, a, b, &left, &right)
        }
        (Value::String(a), _) if op == BinOp::Add => Ok(Value::string(&format!("{a}{right}"))),
        (_, Value::String(b)) if op == BinOp::Add => Ok(Value::string(&format!("{left}{b}"))),
        (Value::Array(a), Value::Array(b)) if op == BinOp::Add => {
            let mut items = Vec::with_capacity(a.len() + b.len());
            items.extend(a.iter().cloned());
            items.extend(b.iter().cloned());
            Ok(Value::array(items))
        }
        _ => Err(RuntimeError::type_mismatch(&op.to_string(), &left, &right)),
    }
}

fn integer_op(op: BinOp, a: i64, b: i64, mode: ArithmeticMode) -> InterpResult<Value> {
    if matches!(op, BinOp::Div | BinOp::Mod) && b == 0 {
        return Err(RuntimeError::division_by_zero());
    }
    let result = if mode.is_checked() {
        let checked = match op {
            BinOp::Add => a.checked_add(b),
            BinOp::Sub => a.checked_sub(b),
            BinOp::Mul => a.checked_mul(b),
            BinOp::Div => a.checked_div(b),
            BinOp::Mod => a.checked_rem(b),
            _ => unreachable!("non-arithmetic operator {op}"),
        };
        checked.ok_or_else(|| RuntimeError::overflow(format!("{a} {op} {b}")))?
    } else {
        match op {
            BinOp::Add => a.wrapping_add(b),
            BinOp::Sub => a.wrapping_sub(b),
            BinOp::Mul => a.wrapping_mul(b),
            BinOp::Div => a.wrapping_div(b),
            BinOp::Mod => a.wrapping_rem(b),
            _ => unreachable!("non-arithmetic operator {op}"),
        }
    };
    Ok(Value::Integer(result))
}

fn real_op(op: BinOp, a: f64, b: f64, left: &Value, right: &Value) -> InterpResult<Value> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Mod => a % b,
        _ => return Err(RuntimeError::type_mismatch(&op.to_string(), left, right)),
    };
    Ok(Value::Real(result))
}

fn compare(op: BinOp, left: &Value, right: &Value) -> InterpResult<Value> {
    let ordering = match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Integer(_) | Value::Real(_), Value::Integer(_) | Value::Real(_)) => left
            .as_real()
            .zip(right.as_real())
            .and_then(|(a, b)| a.partial_cmp(&b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        _ => return Err(RuntimeError::type_mismatch(&op.to_string(), left, right)),
    };
    // NaN compares false under every operator
    let Some(ordering) = ordering else {
        return Ok(Value::Boolean(false));
    };
    let result = match op {
        BinOp::Lt => ordering == Ordering::Less,
        BinOp::Gt => ordering == Ordering::Greater,
        BinOp::Le => ordering != Ordering::Greater,
        BinOp::Ge => ordering != Ordering::Less,
        _ => unreachable!("non-comparison operator {op}"),
    };
    Ok(Value::Boolean(result))
}

/// Apply a unary operator. Proxies are resolved first.
pub fn unary_op(op: UnOp, value: Value, mode: ArithmeticMode) -> InterpResult<Value> {
    let value = value.resolve()?;
    match (op, &value) {
        (UnOp::Neg, Value::Integer(n)) => {
            if mode.is_checked() {
                n.checked_neg()
                    .map(Value::Integer)
                    .ok_or_else(|| RuntimeError::overflow(format!("-({n})")))
            } else {
                Ok(Value::Integer(n.wrapping_neg()))
            }
        }
        (UnOp::Neg, Value::Real(x)) => Ok(Value::Real(-x)),
        (UnOp::Not, _) => Ok(Value::Boolean(!value.is_truthy())),
        (UnOp::Neg, _) => Err(RuntimeError::type_mismatch("-", &value, &Value::Void)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::ErrorKind;

    const CHECKED: ArithmeticMode = ArithmeticMode::Checked;
    const UNCHECKED: ArithmeticMode = ArithmeticMode::Unchecked;

    fn int(n: i64) -> Value {
        Value::Integer(n)
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(binary_op(BinOp::Add, int(2), int(3), CHECKED).unwrap(), int(5));
        assert_eq!(binary_op(BinOp::Div, int(7), int(2), CHECKED).unwrap(), int(3));
        assert_eq!(binary_op(BinOp::Mod, int(-7), int(2), CHECKED).unwrap(), int(-1));
    }

    #[test]
    fn test_overflow_checked_and_wrapping() {
        let err = binary_op(BinOp::Add, int(i64::MAX), int(10), CHECKED).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Overflow);
        let wrapped = binary_op(BinOp::Add, int(i64::MAX), int(10), UNCHECKED).unwrap();
        assert_eq!(wrapped, int(i64::MIN + 9));
    }

    #[test]
    fn test_division_by_zero_in_both_modes() {
        for mode in [CHECKED, UNCHECKED] {
            let err = binary_op(BinOp::Div, int(1), int(0), mode).unwrap_err();
            assert_eq!(err.kind, ErrorKind::DivisionByZero);
        }
    }

    #[test]
    fn test_mixed_numeric_promotes() {
        assert_eq!(binary_op(BinOp::Mul, int(2), Value::Real(1.5), CHECKED).unwrap(), Value::Real(3.0));
        assert_eq!(binary_op(BinOp::Lt, int(1), Value::Real(1.5), CHECKED).unwrap(), Value::Boolean(true));
        assert_eq!(binary_op(BinOp::Eq, int(2), Value::Real(2.0), CHECKED).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_string_concatenation() {
        let joined = binary_op(BinOp::Add, Value::string("n="), int(4), CHECKED).unwrap();
        assert_eq!(joined, Value::string("n=4"));
    }

    #[test]
    fn test_type_mismatch() {
        let err = binary_op(BinOp::Sub, Value::string("a"), int(1), CHECKED).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ContractBinding);
        assert!(err.message.contains("string"));
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary_op(UnOp::Neg, int(4), CHECKED).unwrap(), int(-4));
        assert_eq!(unary_op(UnOp::Not, Value::Boolean(false), CHECKED).unwrap(), Value::Boolean(true));
        assert_eq!(unary_op(UnOp::Neg, int(i64::MIN), CHECKED).unwrap_err().kind, ErrorKind::Overflow);
        assert_eq!(unary_op(UnOp::Neg, int(i64::MIN), UNCHECKED).unwrap(), int(i64::MIN));
    }
}
