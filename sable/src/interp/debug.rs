//! Debugger hook: call-stack tracking and watched values
//!
//! Tracking only exists while a [`DebugMonitor`] is attached. Each execution
//! frame then carries a [`CallStack`] that reports push/pop events to the
//! monitor. Events flow one way and the runtime never waits on the monitor.
//!
//! Arguments of active calls are kept in a [`WatchArena`]. A monitor holds
//! [`WatchHandle`]s into it; a handle goes dead when its call returns, and a
//! later value reusing the same index carries a newer generation.

use std::sync::Arc;

use parking_lot::Mutex;

use super::Value;

/// Receiver of call-stack events
pub trait DebugMonitor: Send + Sync {
    fn on_push(&self, stack: &CallStack, record: &CallRecord);
    fn on_pop(&self, stack: &CallStack, record: &CallRecord);
}

/// Handle to a watched value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct WatchEntry {
    generation: u32,
    value: Option<Value>,
}

/// Generation-counted storage for watched values
#[derive(Debug, Default)]
pub struct WatchArena {
    entries: Vec<WatchEntry>,
    free: Vec<u32>,
}

impl WatchArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: Value) -> WatchHandle {
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.generation = entry.generation.wrapping_add(1);
            entry.value = Some(value);
            return WatchHandle {
                index,
                generation: entry.generation,
            };
        }
        let index = self.entries.len() as u32;
        self.entries.push(WatchEntry {
            generation: 0,
            value: Some(value),
        });
        WatchHandle { index, generation: 0 }
    }

    pub fn is_live(&self, handle: WatchHandle) -> bool {
        self.entries
            .get(handle.index as usize)
            .is_some_and(|e| e.generation == handle.generation && e.value.is_some())
    }

    pub fn get(&self, handle: WatchHandle) -> Option<&Value> {
        let entry = self.entries.get(handle.index as usize)?;
        if entry.generation != handle.generation {
            return None;
        }
        entry.value.as_ref()
    }

    pub fn remove(&mut self, handle: WatchHandle) -> Option<Value> {
        if !self.is_live(handle) {
            return None;
        }
        self.free.push(handle.index);
        self.entries[handle.index as usize].value.take()
    }

    /// Number of live values
    pub fn len(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One active call
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub routine: String,
    pub depth: usize,
    pub args: Vec<WatchHandle>,
}

/// Call stack of one thread of execution
pub struct CallStack {
    frames: Vec<CallRecord>,
    watches: WatchArena,
    monitor: Arc<dyn DebugMonitor>,
}

impl CallStack {
    pub fn new(monitor: Arc<dyn DebugMonitor>) -> Self {
        CallStack {
            frames: Vec::new(),
            watches: WatchArena::new(),
            monitor,
        }
    }

    pub fn push(&mut self, routine: &str, args: &[Value]) {
        let args = args.iter().map(|a| self.watches.insert(a.clone())).collect();
        let record = CallRecord {
            routine: routine.to_string(),
            depth: self.frames.len(),
            args,
        };
        self.monitor.on_push(self, &record);
        self.frames.push(record);
    }

    pub fn pop(&mut self) {
        let Some(record) = self.frames.pop() else {
            return;
        };
        self.monitor.on_pop(self, &record);
        for handle in &record.args {
            self.watches.remove(*handle);
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[CallRecord] {
        &self.frames
    }

    pub fn watched(&self, handle: WatchHandle) -> Option<&Value> {
        self.watches.get(handle)
    }

    pub fn is_live(&self, handle: WatchHandle) -> bool {
        self.watches.is_live(handle)
    }
}

/// Monitor that turns call-stack events into trace events
#[derive(Debug, Default)]
pub struct TracingMonitor;

impl DebugMonitor for TracingMonitor {
    fn on_push(&self, _stack: &CallStack, record: &CallRecord) {
        tracing::trace!(routine = %record.routine, depth = record.depth, "call");
    }

    fn on_pop(&self, _stack: &CallStack, record: &CallRecord) {
        tracing::trace!(routine = %record.routine, depth = record.depth, "return");
    }
}

/// Event captured by [`RecordingMonitor`]
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    Push {
        routine: String,
        depth: usize,
        args: Vec<Value>,
    },
    Pop {
        routine: String,
        depth: usize,
    },
}

/// Monitor that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingMonitor {
    events: Mutex<Vec<MonitorEvent>>,
}

impl RecordingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MonitorEvent> {
        self.events.lock().clone()
    }
}

impl DebugMonitor for RecordingMonitor {
    fn on_push(&self, stack: &CallStack, record: &CallRecord) {
        let args = record
            .args
            .iter()
            .filter_map(|h| stack.watched(*h).cloned())
            .collect();
        self.events.lock().push(MonitorEvent::Push {
            routine: record.routine.clone(),
            depth: record.depth,
            args,
        });
    }

    fn on_pop(&self, _stack: &CallStack, record: &CallRecord) {
        self.events.lock().push(MonitorEvent::Pop {
            routine: record.routine.clone(),
            depth: record.depth,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_generations() {
        let mut arena = WatchArena::new();
        let first = arena.insert(Value::Integer(1));
        assert!(arena.is_live(first));
        assert_eq!(arena.remove(first), Some(Value::Integer(1)));
        assert!(!arena.is_live(first));

        // Index reuse bumps the generation
        let second = arena.insert(Value::Integer(2));
        assert!(!arena.is_live(first));
        assert_eq!(arena.get(first), None);
        assert_eq!(arena.get(second), Some(&Value::Integer(2)));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_remove_dead_handle_is_noop() {
        let mut arena = WatchArena::new();
        let handle = arena.insert(Value::Void);
        arena.remove(handle);
        assert_eq!(arena.remove(handle), None);
        assert!(arena.is_empty());
    }

    #[test]
    fn test_call_stack_reports_events() {
        let monitor = Arc::new(RecordingMonitor::new());
        let mut stack = CallStack::new(monitor.clone());
        stack.push("outer", &[Value::Integer(1)]);
        stack.push("inner", &[]);
        assert_eq!(stack.depth(), 2);
        stack.pop();
        stack.pop();
        stack.pop();

        let events = monitor.events();
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            MonitorEvent::Push {
                routine: "outer".into(),
                depth: 0,
                args: vec![Value::Integer(1)],
            }
        );
        assert_eq!(
            events[3],
            MonitorEvent::Pop {
                routine: "outer".into(),
                depth: 0,
            }
        );
    }

    #[test]
    fn test_arguments_die_with_their_call() {
        let mut stack = CallStack::new(Arc::new(TracingMonitor));
        stack.push("f", &[Value::string("arg")]);
        let handle = stack.frames()[0].args[0];
        assert!(stack.is_live(handle));
        stack.pop();
        assert!(!stack.is_live(handle));
    }
}
