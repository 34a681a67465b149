//! Bounded worker pool behind the default queue

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::{run_body, Completion, WorkBody, WorkItem, WorkItemHandle, WorkItemQueue, WorkStatus};
use crate::interp::{InterpResult, InterpreterState, RuntimeError, Value};

thread_local! {
    static ON_POOL_WORKER: Cell<bool> = const { Cell::new(false) };
}

/// Pool metrics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Items waiting for a worker
    pub queue_depth: usize,
    /// Items currently running on workers
    pub active_tasks: usize,
    pub tasks_completed: u64,
    pub worker_count: usize,
}

/// Queued body plus its completion cell.
///
/// Whoever takes the job first runs it: normally a worker, but a worker
/// blocked on this very item without a timeout takes it over to avoid
/// starving the pool.
struct PoolTask {
    job: Mutex<Option<(WorkBody, InterpreterState)>>,
    completion: Completion,
}

impl PoolTask {
    /// Run the job if nobody has taken it yet
    fn run(&self) -> bool {
        let Some((body, state)) = self.job.lock().take() else {
            return false;
        };
        self.completion.start();
        let result = run_body(body, &state);
        self.completion.finish(result);
        true
    }
}

impl WorkItem for PoolTask {
    fn wait(&self, timeout: Option<Duration>) -> bool {
        if timeout.is_none() && ON_POOL_WORKER.with(Cell::get) && self.run() {
            tracing::trace!("pool worker ran awaited item inline");
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

struct PoolInner {
    queue: Mutex<VecDeque<Arc<PoolTask>>>,
    work_ready: Condvar,
    shutdown: AtomicBool,
    active_tasks: AtomicUsize,
    tasks_completed: AtomicU64,
}

/// Fixed set of worker threads draining a FIFO of work items.
///
/// Workers are named `sable-pool-0`, `sable-pool-1`, etc. Dropping the pool
/// signals shutdown; [`WorkerPool::shutdown`] also joins the workers.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    num_threads: usize,
}

type SpawnFn = dyn Fn(usize, Arc<PoolInner>) -> std::io::Result<JoinHandle<()>>;

impl WorkerPool {
    /// Start `num_threads` workers (at least one). Workers that fail to
    /// spawn are logged and the pool runs with the ones that started.
    pub fn new(num_threads: usize) -> Self {
        Self::start(num_threads, &|i: usize, inner: Arc<PoolInner>| {
            std::thread::Builder::new()
                .name(format!("sable-pool-{i}"))
                .spawn(move || worker_loop(&inner))
        })
    }

    fn start(num_threads: usize, spawn: &SpawnFn) -> Self {
        let requested = num_threads.max(1);
        let inner = Arc::new(PoolInner {
            queue: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            shutdown: AtomicBool::new(false),
            active_tasks: AtomicUsize::new(0),
            tasks_completed: AtomicU64::new(0),
        });

        let mut workers = Vec::with_capacity(requested);
        for i in 0..requested {
            match spawn(i, Arc::clone(&inner)) {
                Ok(handle) => workers.push(handle),
                Err(e) => tracing::error!(worker = i, "failed to spawn pool worker thread: {e}"),
            }
        }
        if workers.len() < requested {
            tracing::warn!(requested, started = workers.len(), "worker pool running short-handed");
        }

        WorkerPool {
            inner,
            num_threads: workers.len(),
            workers: Mutex::new(workers),
        }
    }

    fn submit_task(&self, task: Arc<PoolTask>) -> InterpResult<()> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(RuntimeError::queue_protocol("worker pool has been shut down"));
        }
        if self.num_threads == 0 {
            return Err(RuntimeError::host("worker pool has no worker threads"));
        }
        self.inner.queue.lock().push_back(task);
        self.inner.work_ready.notify_one();
        Ok(())
    }

    /// Signal workers to exit once the queue is empty and join them
    pub fn shutdown(&self) {
        self.signal_shutdown();
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }

    fn signal_shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        // Notify under the lock so a worker between its shutdown check and
        // its wait cannot miss the wakeup
        let _queue = self.inner.queue.lock();
        self.inner.work_ready.notify_all();
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            queue_depth: self.inner.queue.lock().len(),
            active_tasks: self.inner.active_tasks.load(Ordering::Relaxed),
            tasks_completed: self.inner.tasks_completed.load(Ordering::Relaxed),
            worker_count: self.num_threads,
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

/// Decrements `active_tasks` even if bookkeeping code unwinds
struct ActiveTaskGuard<'a> {
    inner: &'a PoolInner,
}

impl Drop for ActiveTaskGuard<'_> {
    fn drop(&mut self) {
        self.inner.active_tasks.fetch_sub(1, Ordering::Release);
        self.inner.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }
}

fn worker_loop(inner: &PoolInner) {
    ON_POOL_WORKER.with(|flag| flag.set(true));
    tracing::debug!("pool worker started");
    loop {
        let task = {
            let mut queue = inner.queue.lock();
            loop {
                if let Some(task) = queue.pop_front() {
                    inner.active_tasks.fetch_add(1, Ordering::Release);
                    break task;
                }
                if inner.shutdown.load(Ordering::Acquire) {
                    tracing::debug!("pool worker stopped");
                    return;
                }
                inner.work_ready.wait(&mut queue);
            }
        };

        let _guard = ActiveTaskGuard { inner };
        // False when a waiter already took the job over
        let ran = task.run();
        tracing::trace!(ran, "pool work item finished");
    }
}

/// Queue backed by a [`WorkerPool`]. No ordering between items.
pub struct DefaultQueue {
    pool: WorkerPool,
}

impl DefaultQueue {
    /// Dedicated pool; 0 threads sizes it to the host's parallelism
    pub fn new(threads: usize) -> Self {
        let threads = if threads == 0 { host_parallelism() } else { threads };
        DefaultQueue {
            pool: WorkerPool::new(threads),
        }
    }

    /// Process-wide pool sized to the host's parallelism
    pub fn shared() -> Arc<dyn WorkItemQueue> {
        static SHARED: OnceLock<Arc<DefaultQueue>> = OnceLock::new();
        let queue = SHARED.get_or_init(|| Arc::new(DefaultQueue::new(0)));
        Arc::clone(queue) as Arc<dyn WorkItemQueue>
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}

fn host_parallelism() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

impl WorkItemQueue for DefaultQueue {
    fn name(&self) -> &str {
        "default"
    }

    fn submit(
        &self,
        _target: Value,
        body: WorkBody,
        state: InterpreterState,
    ) -> InterpResult<WorkItemHandle> {
        let task = Arc::new(PoolTask {
            job: Mutex::new(Some((body, state))),
            completion: Completion::new(),
        });
        self.pool.submit_task(Arc::clone(&task))?;
        tracing::trace!("pool work item submitted");
        Ok(WorkItemHandle::new(task))
    }
}
