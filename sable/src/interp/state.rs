//! Interpreter state shared by one top-level run

use std::fmt;
use std::sync::Arc;

use super::{DebugMonitor, ScriptObject};
use crate::contract::{ArithmeticMode, RelationshipCache};
use crate::queue::{DefaultQueue, WorkItemQueue};

/// Per-run context threaded through every operation.
///
/// Cloning is cheap; fork bodies take a clone at creation time, so the mode
/// and queue they observe are fixed when they are submitted.
#[derive(Clone)]
pub struct InterpreterState {
    /// Mode for code not inside a checked/unchecked block
    pub mode: ArithmeticMode,
    pub globals: Arc<ScriptObject>,
    /// Queue used by fork bodies without `via`
    pub queue: Arc<dyn WorkItemQueue>,
    /// Attached debugger hook, if any
    pub monitor: Option<Arc<dyn DebugMonitor>>,
    pub cache: Arc<RelationshipCache>,
}

impl InterpreterState {
    pub fn new(globals: Arc<ScriptObject>) -> Self {
        InterpreterState {
            mode: ArithmeticMode::Checked,
            globals,
            queue: DefaultQueue::shared(),
            monitor: None,
            cache: Arc::new(RelationshipCache::new()),
        }
    }

    pub fn with_mode(mut self, mode: ArithmeticMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_queue(mut self, queue: Arc<dyn WorkItemQueue>) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn DebugMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn is_checked(&self) -> bool {
        self.mode.is_checked()
    }
}

impl fmt::Debug for InterpreterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpreterState")
            .field("mode", &self.mode)
            .field("globals", &self.globals.names())
            .field("queue", &self.queue.name())
            .field("monitor", &self.monitor.is_some())
            .finish()
    }
}
