//! Sable: contract-typed scripting runtime
//!
//! Programs arrive as an AST, are lowered by the scope compiler into closure
//! trees, and run against an interpreter state. Fork and synchronized bodies
//! are scheduled on pluggable work-item queues.

pub mod ast;
pub mod compiler;
pub mod config;
pub mod contract;
pub mod engine;
pub mod error;
pub mod interp;
pub mod queue;
pub mod util;

pub use ast::{Program, Span};
pub use compiler::{compile, Compiler, Fragment};
pub use config::{QueueKind, RunConfig};
pub use contract::{ArithmeticMode, Contract, Relationship};
pub use engine::Engine;
pub use error::{CompileError, Result, SableError};
pub use interp::{ErrorKind, InterpResult, InterpreterState, RuntimeError, ScriptObject, Value};
