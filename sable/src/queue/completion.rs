//! Shared completion cell used by the built-in queues

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::{WorkItem, WorkStatus};
use crate::interp::{InterpResult, Value};

enum Outcome {
    Pending,
    Running,
    Done(InterpResult<Value>),
}

/// Result slot that waiters block on
pub struct Completion {
    outcome: Mutex<Outcome>,
    ready: Condvar,
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl Completion {
    pub fn new() -> Self {
        Completion {
            outcome: Mutex::new(Outcome::Pending),
            ready: Condvar::new(),
        }
    }

    /// Mark the body as picked up
    pub fn start(&self) {
        let mut outcome = self.outcome.lock();
        if matches!(*outcome, Outcome::Pending) {
            *outcome = Outcome::Running;
        }
    }

    /// Store the outcome and wake every waiter. Only the first call counts.
    pub fn finish(&self, result: InterpResult<Value>) {
        let mut outcome = self.outcome.lock();
        if matches!(*outcome, Outcome::Done(_)) {
            return;
        }
        *outcome = Outcome::Done(result);
        self.ready.notify_all();
    }
}

impl WorkItem for Completion {
    fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut outcome = self.outcome.lock();
        // A timeout too large to represent waits forever
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        while !matches!(*outcome, Outcome::Done(_)) {
            match deadline {
                None => self.ready.wait(&mut outcome),
                Some(deadline) => {
                    if self.ready.wait_until(&mut outcome, deadline).timed_out() {
                        return matches!(*outcome, Outcome::Done(_));
                    }
                }
            }
        }
        true
    }

    fn result(&self) -> Option<InterpResult<Value>> {
        match &*self.outcome.lock() {
            Outcome::Done(result) => Some(result.clone()),
            _ => None,
        }
    }

    fn status(&self) -> WorkStatus {
        match &*self.outcome.lock() {
            Outcome::Pending => WorkStatus::Pending,
            Outcome::Running => WorkStatus::Running,
            Outcome::Done(Ok(_)) => WorkStatus::Completed,
            Outcome::Done(Err(_)) => WorkStatus::Faulted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::RuntimeError;
    use std::sync::Arc;

    #[test]
    fn test_lifecycle() {
        let cell = Completion::new();
        assert_eq!(cell.status(), WorkStatus::Pending);
        cell.start();
        assert_eq!(cell.status(), WorkStatus::Running);
        assert!(!cell.wait(Some(Duration::from_millis(5))));
        cell.finish(Ok(Value::Integer(1)));
        assert_eq!(cell.status(), WorkStatus::Completed);

        // Terminal states are final
        cell.finish(Err(RuntimeError::host("late")));
        cell.start();
        assert_eq!(cell.status(), WorkStatus::Completed);
        assert_eq!(cell.result().unwrap().unwrap(), Value::Integer(1));
    }

    #[test]
    fn test_fault_is_terminal() {
        let cell = Completion::new();
        cell.finish(Err(RuntimeError::fault(Value::string("bad"))));
        assert!(cell.wait(None));
        assert_eq!(cell.status(), WorkStatus::Faulted);
        assert!(cell.result().unwrap().is_err());
    }

    #[test]
    fn test_wakes_waiter_on_other_thread() {
        let cell = Arc::new(Completion::new());
        let writer = Arc::clone(&cell);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            writer.finish(Ok(Value::Boolean(true)));
        });
        assert!(cell.wait(Some(Duration::from_secs(5))));
        handle.join().unwrap();
    }
}
