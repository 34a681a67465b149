//! Deferred queue: bodies run on the first waiter's thread

use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use parking_lot::Mutex;

use super::{run_body, Completion, WorkBody, WorkItem, WorkItemHandle, WorkItemQueue, WorkStatus};
use crate::interp::{InterpResult, InterpreterState, Value};

/// Submission does no work. The first wait runs the body inline, ignoring
/// its timeout, and every later wait returns the memoized outcome.
#[derive(Debug, Default)]
pub struct LazyQueue;

impl LazyQueue {
    pub fn new() -> Self {
        LazyQueue
    }
}

impl WorkItemQueue for LazyQueue {
    fn name(&self) -> &str {
        "lazy"
    }

    fn submit(
        &self,
        _target: Value,
        body: WorkBody,
        state: InterpreterState,
    ) -> InterpResult<WorkItemHandle> {
        tracing::trace!("lazy work item deferred");
        Ok(WorkItemHandle::new(Arc::new(LazyItem {
            pending: Mutex::new(Some((body, state))),
            runner: Mutex::new(None),
            completion: Completion::new(),
        })))
    }
}

struct LazyItem {
    pending: Mutex<Option<(WorkBody, InterpreterState)>>,
    runner: Mutex<Option<ThreadId>>,
    completion: Completion,
}

impl WorkItem for LazyItem {
    fn wait(&self, timeout: Option<Duration>) -> bool {
        let job = self.pending.lock().take();
        if let Some((body, state)) = job {
            *self.runner.lock() = Some(std::thread::current().id());
            self.completion.start();
            let result = run_body(body, &state);
            self.completion.finish(result);
            return true;
        }
        if self.completion.is_completed() {
            return true;
        }
        // The body is waiting on itself; blocking would never return
        if *self.runner.lock() == Some(std::thread::current().id()) {
            return false;
        }
        self.completion.wait(timeout)
    }

    fn result(&self) -> Option<InterpResult<Value>> {
        self.completion.result()
    }

    fn status(&self) -> WorkStatus {
        self.completion.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::ScriptObject;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn state() -> InterpreterState {
        InterpreterState::new(Arc::new(ScriptObject::new()))
    }

    #[test]
    fn test_runs_once_on_first_wait() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let body: WorkBody = Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Integer(7))
        });
        let handle = LazyQueue::new().submit(Value::Void, body, state()).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(handle.status(), WorkStatus::Pending);

        let first = handle.await_value(Some(Duration::ZERO), Value::Void).unwrap();
        let second = handle.await_value(Some(Duration::ZERO), Value::Void).unwrap();
        assert_eq!(first, Value::Integer(7));
        assert_eq!(second, Value::Integer(7));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_runs_on_waiting_thread() {
        let body: WorkBody = Box::new(|_| Ok(Value::string(&format!("{:?}", std::thread::current().id()))));
        let handle = LazyQueue::new().submit(Value::Void, body, state()).unwrap();
        let ran_on = handle.unwrap().unwrap();
        assert_eq!(ran_on, Value::string(&format!("{:?}", std::thread::current().id())));
    }
}
