//! Work-item queues and the async protocol
//!
//! Fork and synchronized bodies are submitted to a [`WorkItemQueue`] and
//! represented by a [`WorkItemHandle`]. A handle moves from Pending through
//! Running to Completed or Faulted and never leaves a terminal state. Waiters
//! observe it through [`WorkItemHandle::await_value`] (bounded wait with a
//! fallback) or [`WorkItemHandle::unwrap`] (unbounded).
//!
//! Built-in disciplines:
//! - [`ParallelQueue`]: one thread per submission
//! - [`LazyQueue`]: nothing runs until the first wait, which runs inline
//! - [`DefaultQueue`]: a bounded worker pool sized to the host
//! - [`ScriptQueue`]: adapts a script object exposing `submit`

mod completion;
mod lazy;
mod parallel;
mod pool;
mod script;

pub use completion::Completion;
pub use lazy::LazyQueue;
pub use parallel::ParallelQueue;
pub use pool::{DefaultQueue, PoolStats, WorkerPool};
pub use script::ScriptQueue;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::QueueKind;
use crate::interp::{InterpResult, InterpreterState, RuntimeError, Value};

/// Body of a work item. Runs at most once, on whichever thread the queue
/// chooses.
pub type WorkBody = Box<dyn FnOnce(&InterpreterState) -> InterpResult<Value> + Send>;

/// Lifecycle of a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStatus {
    Pending,
    Running,
    Completed,
    Faulted,
}

impl WorkStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkStatus::Completed | WorkStatus::Faulted)
    }
}

/// One submitted body as seen by waiters
pub trait WorkItem: Send + Sync {
    /// Block until the item is terminal or `timeout` elapses (`None` waits
    /// forever). Returns whether the item is terminal.
    fn wait(&self, timeout: Option<Duration>) -> bool;

    /// Outcome of a terminal item, `None` while still pending
    fn result(&self) -> Option<InterpResult<Value>>;

    fn status(&self) -> WorkStatus;

    fn is_completed(&self) -> bool {
        self.status().is_terminal()
    }
}

/// Execution discipline for work items
pub trait WorkItemQueue: Send + Sync {
    fn name(&self) -> &str;

    /// Schedule `body`. `target` is the value the body is bound to (the
    /// synchronized target, or void).
    fn submit(
        &self,
        target: Value,
        body: WorkBody,
        state: InterpreterState,
    ) -> InterpResult<WorkItemHandle>;
}

/// Shared reference to a submitted work item
#[derive(Clone)]
pub struct WorkItemHandle(Arc<dyn WorkItem>);

impl WorkItemHandle {
    pub fn new(item: Arc<dyn WorkItem>) -> Self {
        WorkItemHandle(item)
    }

    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        self.0.wait(timeout)
    }

    pub fn status(&self) -> WorkStatus {
        self.0.status()
    }

    pub fn is_completed(&self) -> bool {
        self.0.is_completed()
    }

    /// Outcome of a terminal item. A faulted item re-raises its error.
    pub fn result(&self) -> InterpResult<Value> {
        self.0.result().unwrap_or_else(|| {
            Err(RuntimeError::queue_protocol(
                "work item reported completion without a result",
            ))
        })
    }

    /// Block until resolved and return the outcome
    pub fn unwrap(&self) -> InterpResult<Value> {
        if !self.wait(None) {
            return Err(RuntimeError::queue_protocol(
                "unbounded wait returned before the work item resolved",
            ));
        }
        self.result()
    }

    /// The value if the item resolves within `timeout`, otherwise
    /// `fallback`. The item keeps running after a timeout.
    pub fn await_value(&self, timeout: Option<Duration>, fallback: Value) -> InterpResult<Value> {
        if self.wait(timeout) {
            self.result()
        } else {
            tracing::debug!(?timeout, "await timed out, using fallback");
            Ok(fallback)
        }
    }

    pub fn ptr_eq(&self, other: &WorkItemHandle) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }

    /// Identity of the underlying item, for hashing
    pub fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for WorkItemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WorkItemHandle").field(&self.status()).finish()
    }
}

/// Build a queue of the given discipline. `pool_threads` sizes a dedicated
/// pool for [`QueueKind::Default`]; 0 selects the shared host-sized pool.
pub fn create_queue(kind: QueueKind, pool_threads: usize) -> Arc<dyn WorkItemQueue> {
    match kind {
        QueueKind::Parallel => Arc::new(ParallelQueue::new()),
        QueueKind::Lazy => Arc::new(LazyQueue::new()),
        QueueKind::Default if pool_threads == 0 => DefaultQueue::shared(),
        QueueKind::Default => Arc::new(DefaultQueue::new(pool_threads)),
    }
}

/// Run a work body, turning a panic into a host error
pub(crate) fn run_body(body: WorkBody, state: &InterpreterState) -> InterpResult<Value> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| body(state))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "(non-string panic)".to_string());
            tracing::error!("work item panicked: {message}");
            Err(RuntimeError::host(format!("work item panicked: {message}")))
        }
    }
}
