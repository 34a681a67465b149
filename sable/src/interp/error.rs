//! Runtime errors for the interpreter

use std::fmt;

use super::Value;
use crate::contract::Contract;

/// Runtime error during execution of a compiled fragment
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Kinds of runtime errors
#[derive(Debug, Clone)]
pub enum ErrorKind {
    /// Value cannot be bound to a contract
    ContractBinding,
    /// Lossy narrowing or arithmetic overflow in checked mode
    Overflow,
    /// Write to an initialized immutable slot
    ConstantMutation,
    /// Read of an uninitialized slot in checked mode
    UnassignedSlot,
    /// Member lookup on a value that has no such member
    MissingMember,
    /// Invocation of something that is not a routine
    NotCallable,
    /// Argument count mismatch on dynamic dispatch
    ArityMismatch,
    DivisionByZero,
    IndexOutOfBounds,
    /// Deep recursion
    StackOverflow,
    /// A queue or work item broke the submit/await protocol
    QueueProtocol,
    /// Failure inside host code (native routine, panicking work item)
    Host,
    /// User-raised fault carrying a value
    Fault(Box<Value>),
    /// Control flow: break out of a loop (optionally labelled)
    Break(Option<String>),
    /// Control flow: continue with the next iteration
    Continue(Option<String>),
    /// Control flow: early return from a routine
    Return(Box<Value>),
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        // Payloads are not part of the kind
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl RuntimeError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        RuntimeError {
            kind,
            message: message.into(),
        }
    }

    pub fn contract_binding(value: &Value, contract: &Contract) -> Self {
        Self::new(
            ErrorKind::ContractBinding,
            format!("cannot bind {} value `{value}` to contract {contract}", value.kind_name()),
        )
    }

    pub fn not_iterable(value: &Value) -> Self {
        Self::new(
            ErrorKind::ContractBinding,
            format!("{} value is not iterable", value.kind_name()),
        )
    }

    pub fn overflow(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Overflow, format!("overflow: {}", message.into()))
    }

    pub fn constant_mutation(name: &str) -> Self {
        Self::new(
            ErrorKind::ConstantMutation,
            format!("cannot modify initialized constant `{name}`"),
        )
    }

    pub fn unassigned(name: &str) -> Self {
        Self::new(
            ErrorKind::UnassignedSlot,
            format!("`{name}` is read before it is assigned"),
        )
    }

    pub fn missing_member(name: &str) -> Self {
        Self::new(ErrorKind::MissingMember, format!("no member named `{name}`"))
    }

    pub fn not_callable(value: &Value) -> Self {
        Self::new(
            ErrorKind::NotCallable,
            format!("{} value is not callable", value.kind_name()),
        )
    }

    pub fn arity_mismatch(name: &str, expected: usize, got: usize) -> Self {
        Self::new(
            ErrorKind::ArityMismatch,
            format!("routine {name} expects {expected} argument(s), got {got}"),
        )
    }

    pub fn division_by_zero() -> Self {
        Self::new(ErrorKind::DivisionByZero, "division by zero")
    }

    pub fn index_out_of_bounds(index: i64, len: usize) -> Self {
        Self::new(
            ErrorKind::IndexOutOfBounds,
            format!("index {index} out of bounds for length {len}"),
        )
    }

    pub fn type_mismatch(op: &str, left: &Value, right: &Value) -> Self {
        Self::new(
            ErrorKind::ContractBinding,
            format!(
                "operator {op} is not defined for {} and {}",
                left.kind_name(),
                right.kind_name()
            ),
        )
    }

    pub fn stack_overflow() -> Self {
        Self::new(ErrorKind::StackOverflow, "stack overflow: too deep recursion")
    }

    pub fn queue_protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::QueueProtocol, message)
    }

    pub fn host(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Host, message)
    }

    pub fn fault(value: Value) -> Self {
        let message = format!("fault: {value}");
        Self::new(ErrorKind::Fault(Box::new(value)), message)
    }

    pub fn break_loop(label: Option<String>) -> Self {
        Self::new(ErrorKind::Break(label), "break outside of loop")
    }

    pub fn continue_loop(label: Option<String>) -> Self {
        Self::new(ErrorKind::Continue(label), "continue outside of loop")
    }

    pub fn return_value(value: Value) -> Self {
        Self::new(ErrorKind::Return(Box::new(value)), "return outside of routine")
    }

    /// Break, continue and return travel as errors but are not failures
    pub fn is_control_flow(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Break(_) | ErrorKind::Continue(_) | ErrorKind::Return(_)
        )
    }

    /// Errors unchecked mode replaces with a default value
    pub fn is_binding_failure(&self) -> bool {
        matches!(self.kind, ErrorKind::ContractBinding | ErrorKind::MissingMember)
    }

    /// Errors a try/else handler may intercept. Host failures and control
    /// flow pass through.
    pub fn is_catchable(&self) -> bool {
        !self.is_control_flow()
            && !matches!(
                self.kind,
                ErrorKind::StackOverflow | ErrorKind::QueueProtocol | ErrorKind::Host
            )
    }

    /// Value bound to the handler variable of a try/else
    pub fn payload(&self) -> Value {
        match &self.kind {
            ErrorKind::Fault(value) => value.as_ref().clone(),
            _ => Value::string(&self.message),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Runtime error: {}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// Result type for interpreter operations
pub type InterpResult<T> = Result<T, RuntimeError>;
