//! Adapter for queues written in script

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{run_body, WorkBody, WorkItem, WorkItemHandle, WorkItemQueue, WorkStatus};
use crate::interp::{
    invoke, Frame, InterpResult, InterpreterState, NativeFunction, RuntimeError, ScriptObject, Value,
};

/// Queue implemented by a script object.
///
/// The object must have a `submit(target, work)` member. `work` is a
/// zero-argument routine that runs the body and may be called once.
/// `submit` returns either a proxy, or an object with members
/// `wait(timeout_ms)` (a negative timeout waits forever) and `result()`.
pub struct ScriptQueue {
    object: Arc<ScriptObject>,
}

impl ScriptQueue {
    pub fn new(object: Arc<ScriptObject>) -> Self {
        ScriptQueue { object }
    }

    /// Interpret a value used after `via` as a queue
    pub fn adapt(value: &Value) -> InterpResult<Arc<dyn WorkItemQueue>> {
        match value {
            Value::Queue(queue) => Ok(Arc::clone(queue)),
            Value::Object(object) if object.contains("submit") => {
                Ok(Arc::new(ScriptQueue::new(Arc::clone(object))))
            }
            other => Err(RuntimeError::queue_protocol(format!(
                "{} value is not a queue",
                other.kind_name()
            ))),
        }
    }
}

impl WorkItemQueue for ScriptQueue {
    fn name(&self) -> &str {
        "script"
    }

    fn submit(
        &self,
        target: Value,
        body: WorkBody,
        state: InterpreterState,
    ) -> InterpResult<WorkItemHandle> {
        // The body runs under the state captured at submission, not the caller's
        let job = Mutex::new(Some((body, state.clone())));
        let work = NativeFunction::new("work", Some(0), move |_, _: &mut Frame| {
            let Some((body, captured)) = job.lock().take() else {
                return Err(RuntimeError::queue_protocol("work item body already ran"));
            };
            run_body(body, &captured)
        });

        let submit = self.object.get("submit", state.mode)?;
        let mut frame = Frame::detached(state.clone());
        let returned = invoke(&submit, vec![target, Value::Native(Arc::new(work))], &mut frame)?;

        match returned {
            Value::Proxy(handle) => Ok(handle),
            Value::Object(item) if item.contains("wait") && item.contains("result") => {
                Ok(WorkItemHandle::new(Arc::new(ScriptWorkItem {
                    item,
                    state,
                    outcome: Mutex::new(None),
                })))
            }
            other => Err(RuntimeError::queue_protocol(format!(
                "queue submit returned {} value instead of a work item",
                other.kind_name()
            ))),
        }
    }
}

/// Work item object returned by a script queue. Once its outcome is
/// fetched it is cached and the script is not consulted again.
struct ScriptWorkItem {
    item: Arc<ScriptObject>,
    state: InterpreterState,
    outcome: Mutex<Option<InterpResult<Value>>>,
}

impl ScriptWorkItem {
    fn call(&self, member: &str, args: Vec<Value>) -> InterpResult<Value> {
        let callee = self.item.get(member, self.state.mode)?;
        invoke(&callee, args, &mut Frame::detached(self.state.clone()))
    }
}

impl WorkItem for ScriptWorkItem {
    fn wait(&self, timeout: Option<Duration>) -> bool {
        if self.outcome.lock().is_some() {
            return true;
        }
        let millis = timeout.map_or(-1, |t| i64::try_from(t.as_millis()).unwrap_or(i64::MAX));
        let outcome = match self.call("wait", vec![Value::Integer(millis)]) {
            Ok(done) if !done.is_truthy() => return false,
            Ok(_) => self.call("result", vec![]),
            Err(err) => Err(err),
        };
        let mut cached = self.outcome.lock();
        if cached.is_none() {
            *cached = Some(outcome);
        }
        true
    }

    fn result(&self) -> Option<InterpResult<Value>> {
        self.outcome.lock().clone()
    }

    fn status(&self) -> WorkStatus {
        match &*self.outcome.lock() {
            None => WorkStatus::Pending,
            Some(Ok(_)) => WorkStatus::Completed,
            Some(Err(_)) => WorkStatus::Faulted,
        }
    }
}
