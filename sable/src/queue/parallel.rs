//! Thread-per-item queue

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{run_body, Completion, WorkBody, WorkItemHandle, WorkItemQueue};
use crate::interp::{InterpResult, InterpreterState, RuntimeError, Value};

/// Spawns a named thread for every submission. No back-pressure.
#[derive(Debug, Default)]
pub struct ParallelQueue {
    spawned: AtomicU64,
}

impl ParallelQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads started so far
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }
}

impl WorkItemQueue for ParallelQueue {
    fn name(&self) -> &str {
        "parallel"
    }

    fn submit(
        &self,
        _target: Value,
        body: WorkBody,
        state: InterpreterState,
    ) -> InterpResult<WorkItemHandle> {
        let id = self.spawned.fetch_add(1, Ordering::Relaxed);
        let item = Arc::new(Completion::new());
        let worker = Arc::clone(&item);

        std::thread::Builder::new()
            .name(format!("sable-fork-{id}"))
            .spawn(move || {
                worker.start();
                let result = run_body(body, &state);
                tracing::trace!(id, ok = result.is_ok(), "parallel work item finished");
                worker.finish(result);
            })
            .map_err(|e| RuntimeError::host(format!("cannot start fork thread: {e}")))?;

        tracing::trace!(id, "parallel work item submitted");
        Ok(WorkItemHandle::new(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::{ErrorKind, ScriptObject};
    use crate::queue::WorkStatus;
    use std::time::Duration;

    fn state() -> InterpreterState {
        InterpreterState::new(Arc::new(ScriptObject::new()))
    }

    #[test]
    fn test_runs_on_named_thread() {
        let queue = ParallelQueue::new();
        let body: WorkBody = Box::new(|_| {
            let name = std::thread::current().name().unwrap_or_default().to_string();
            Ok(Value::string(&name))
        });
        let handle = queue.submit(Value::Void, body, state()).unwrap();
        let name = handle.unwrap().unwrap();
        assert!(name.to_string().starts_with("sable-fork-"));
        assert_eq!(queue.spawned(), 1);
    }

    #[test]
    fn test_await_with_timeout_then_value() {
        let queue = ParallelQueue::new();
        let body: WorkBody = Box::new(|_| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(Value::Integer(2))
        });
        let handle = queue.submit(Value::Void, body, state()).unwrap();
        let early = handle.await_value(Some(Duration::from_millis(50)), Value::Integer(42)).unwrap();
        assert_eq!(early, Value::Integer(42));
        let late = handle.await_value(Some(Duration::from_secs(5)), Value::Integer(42)).unwrap();
        assert_eq!(late, Value::Integer(2));
    }

    #[test]
    fn test_panic_becomes_fault() {
        let queue = ParallelQueue::new();
        let body: WorkBody = Box::new(|_| panic!("boom"));
        let handle = queue.submit(Value::Void, body, state()).unwrap();
        let err = handle.unwrap().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Host);
        assert!(err.message.contains("boom"));
        assert_eq!(handle.status(), WorkStatus::Faulted);
    }
}
