use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;

pub(crate) type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Keys of tasks that are queued or running.
pub(crate) type Registry = Mutex<HashMap<String, Arc<TaskState>>>;

pub(crate) fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<String, Arc<TaskState>>> {
    // Finish never panics while holding the lock, so a poisoned registry is still consistent.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared state of one submitted task.
pub(crate) struct TaskState {
    id: u64,
    key: Option<String>,
    registry: Weak<Registry>,
    finished: AtomicBool,
    done: watch::Sender<bool>,
}

impl TaskState {
    pub(crate) fn new(id: u64, key: Option<String>, registry: &Arc<Registry>) -> Arc<Self> {
        Arc::new(Self {
            id,
            key,
            registry: Arc::downgrade(registry),
            finished: AtomicBool::new(false),
            done: watch::Sender::new(false),
        })
    }

    pub(crate) fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Mark the task finished: deregister its key, then wake every waiter.
    ///
    /// Only the first call has any effect.
    pub(crate) fn finish(&self) {
        if self.finished.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return;
        }
        if let (Some(key), Some(registry)) = (&self.key, self.registry.upgrade()) {
            let mut registry = lock(&registry);
            // A newer task may already own the key; leave it alone.
            if registry.get(key).is_some_and(|entry| std::ptr::eq(Arc::as_ptr(entry), self)) {
                registry.remove(key);
            }
        }
        self.done.send_replace(true);
    }
}

/// A task popped off the queue, ready to run.
pub(crate) struct Queued {
    pub(crate) state: Arc<TaskState>,
    pub(crate) job: Job,
}

impl Queued {
    /// Run the payload. The task is finished however the payload ends,
    /// including by panicking.
    pub(crate) async fn run(self) {
        let Self { state, job } = self;
        let _guard = FinishGuard(state);
        job.await;
    }
}

struct FinishGuard(Arc<TaskState>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Handle to a submitted task.
///
/// Handles returned for the same deduplicated key compare equal.
#[derive(Clone)]
pub struct TaskHandle(pub(crate) Arc<TaskState>);

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn key(&self) -> Option<&str> {
        self.0.key()
    }

    pub fn is_finished(&self) -> bool {
        *self.0.done.borrow()
    }

    /// Wait until the task has finished, whether it ran, panicked or was
    /// dropped from the queue.
    pub async fn wait(&self) {
        let mut done = self.0.done.subscribe();
        // The sender lives in the task state we hold, so this never errors.
        let _ = done.wait_for(|finished| *finished).await;
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TaskHandle {}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.0.id)
            .field("key", &self.0.key)
            .field("finished", &self.is_finished())
            .finish()
    }
}
