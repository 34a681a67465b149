//! Mutual exclusion for synchronized bodies

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, ReentrantMutex};

use super::Value;

type Monitor = Arc<ReentrantMutex<()>>;

/// Monitors for targets that are not objects, keyed by value fingerprint.
///
/// Entries are weak: a monitor lives only while some body holds or waits on
/// it, and dead entries are pruned whenever a new one is inserted.
fn registry() -> &'static Mutex<HashMap<u64, Weak<ReentrantMutex<()>>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<u64, Weak<ReentrantMutex<()>>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn value_monitor(target: &Value) -> Monitor {
    let key = target.fingerprint();
    let mut monitors = registry().lock();
    if let Some(monitor) = monitors.get(&key).and_then(Weak::upgrade) {
        return monitor;
    }
    monitors.retain(|_, monitor| monitor.strong_count() > 0);
    let monitor = Arc::new(ReentrantMutex::new(()));
    monitors.insert(key, Arc::downgrade(&monitor));
    monitor
}

/// Run `f` while holding the monitor of `target`.
///
/// Objects carry their own monitor; any other value locks a monitor shared by
/// every equal value. The monitor is reentrant, so a body may synchronize on
/// a target it already holds.
pub fn synchronized<T>(target: &Value, f: impl FnOnce() -> T) -> T {
    match target {
        Value::Object(object) => {
            let _guard = object.monitor().lock();
            f()
        }
        other => {
            let monitor = value_monitor(other);
            let _guard = monitor.lock();
            f()
        }
    }
}
