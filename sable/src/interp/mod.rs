//! Runtime model for compiled fragments
//!
//! Values, slots and environments, the operator semantics, routine
//! invocation, and the interpreter state that every fragment runs against.
//! Code itself is produced by [`crate::compiler`] as closures of type
//! [`Eval`].

pub mod builtins;
mod debug;
mod env;
mod error;
mod frame;
mod monitor;
mod object;
mod ops;
mod routine;
mod slot;
mod state;
mod value;

pub use debug::{
    CallRecord, CallStack, DebugMonitor, MonitorEvent, RecordingMonitor, TracingMonitor,
    WatchArena, WatchHandle,
};
pub use env::{Environment, Layout};
pub use error::{ErrorKind, InterpResult, RuntimeError};
pub use frame::{Eval, Frame, MAX_CALL_DEPTH};
pub use monitor::synchronized;
pub use object::ScriptObject;
pub use ops::{binary_op, unary_op};
pub use routine::{invoke, NativeFn, NativeFunction, Routine};
pub use slot::{RuntimeSlot, SlotAttributes};
pub use state::InterpreterState;
pub use value::Value;
