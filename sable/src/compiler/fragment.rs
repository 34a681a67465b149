//! Compiled programs

use std::fmt;

use crate::contract::Contract;
use crate::interp::{Environment, ErrorKind, Eval, Frame, InterpResult, InterpreterState, Layout, RuntimeError, Value};

/// A compiled program, ready to run any number of times against an
/// interpreter state. Each run gets a fresh top-level activation.
#[derive(Clone)]
pub struct Fragment {
    body: Eval,
    layout: Layout,
    contract: Contract,
}

impl Fragment {
    pub(crate) fn new(body: Eval, layout: Layout, contract: Contract) -> Self {
        Fragment { body, layout, contract }
    }

    /// Run to completion. A top-level `return` ends the run with its value;
    /// otherwise the value of the final expression statement (or void).
    pub fn run(&self, state: &InterpreterState) -> InterpResult<Value> {
        let mut frame = Frame::new(Environment::new(&self.layout, None), state.clone());
        match (self.body)(&mut frame) {
            Err(RuntimeError {
                kind: ErrorKind::Return(value),
                ..
            }) => Ok(*value),
            other => other,
        }
    }

    /// Contract the result is known to satisfy
    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// Slots in the top-level activation
    pub fn slot_count(&self) -> usize {
        self.layout.len()
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fragment")
            .field("slots", &self.layout.len())
            .field("contract", &self.contract)
            .finish_non_exhaustive()
    }
}
