//! Execution frames

use std::sync::Arc;

use super::{CallStack, Environment, InterpResult, InterpreterState, Value};
use crate::contract::ArithmeticMode;

/// Compiled code: a closure over the lowered tree
pub type Eval = Arc<dyn Fn(&mut Frame) -> InterpResult<Value> + Send + Sync>;

/// Maximum nesting of routine calls on one thread
pub const MAX_CALL_DEPTH: usize = 10_000;

/// Execution context of the routine activation currently running
pub struct Frame {
    pub env: Arc<Environment>,
    pub state: InterpreterState,
    /// Present only while a debug monitor is attached
    pub calls: Option<CallStack>,
    pub depth: usize,
}

impl Frame {
    /// Top-level frame for a run
    pub fn new(env: Arc<Environment>, state: InterpreterState) -> Self {
        let calls = state.monitor.clone().map(CallStack::new);
        Frame {
            env,
            state,
            calls,
            depth: 0,
        }
    }

    /// Frame for host code that runs outside any activation
    pub fn detached(state: InterpreterState) -> Self {
        Frame::new(Arc::new(Environment::default()), state)
    }

    /// Effective mode: the lexical override if any, else the run's mode
    pub fn mode(&self, lexical: Option<ArithmeticMode>) -> ArithmeticMode {
        lexical.unwrap_or(self.state.mode)
    }

    /// Run `f` in a callee frame over `env`. The call stack moves into the
    /// callee and back.
    pub fn enter<T>(&mut self, env: Arc<Environment>, f: impl FnOnce(&mut Frame) -> T) -> T {
        let mut callee = Frame {
            env,
            state: self.state.clone(),
            calls: self.calls.take(),
            depth: self.depth + 1,
        };
        let result = f(&mut callee);
        self.calls = callee.calls.take();
        result
    }
}
