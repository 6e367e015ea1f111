//! Bounded background task dispatcher with per-key deduplication.
//!
//! A [`Dispatcher`] owns a bounded queue and a single dispatch loop that runs
//! at most `max_parallel` tasks at once. Keyed submissions are deduplicated:
//! while a task for a key is queued or running, submitting the same key
//! returns the existing [`TaskHandle`] instead of queueing new work.
//!
//! ```
//! use filer_dispatch::Dispatcher;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = Dispatcher::new(2, 8);
//! dispatcher.start()?;
//! let first = dispatcher.try_submit_keyed("thumb/cat.jpeg", async { /* expensive */ }).unwrap();
//! let again = dispatcher.try_submit_keyed("thumb/cat.jpeg", async { /* never runs */ }).unwrap();
//! assert_eq!(first, again);
//! first.wait().await;
//! dispatcher.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
mod task;

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::task::TaskHandle;
use crate::task::{Queued, Registry, TaskState, lock};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

pub struct Dispatcher {
    max_parallel: usize,
    sender: mpsc::Sender<Queued>,
    receiver: Mutex<Option<mpsc::Receiver<Queued>>>,
    dispatch_loop: Mutex<Option<JoinHandle<()>>>,
    registry: Arc<Registry>,
    cancel: CancellationToken,
    next_id: AtomicU64,
}

impl Dispatcher {
    /// Create a stopped dispatcher. Work can be queued straight away but
    /// nothing runs until [`start`](Self::start).
    ///
    /// Zero values are raised to one.
    pub fn new(max_parallel: usize, queue_depth: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_depth.max(1));
        Self {
            max_parallel: max_parallel.max(1),
            sender,
            receiver: Mutex::new(Some(receiver)),
            dispatch_loop: Mutex::new(None),
            registry: Arc::default(),
            cancel: CancellationToken::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Spawn the dispatch loop on the current tokio runtime.
    pub fn start(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            exn::bail!(ErrorKind::Closed);
        }
        let Some(receiver) = self.receiver.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            exn::bail!(ErrorKind::AlreadyStarted);
        };
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let handle = tokio::spawn(dispatch(receiver, semaphore, self.cancel.clone()));
        *self.dispatch_loop.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        tracing::debug!(max_parallel = self.max_parallel, "Dispatcher started");
        Ok(())
    }

    /// Stop accepting work, finish everything still queued without running
    /// it, and wait for the tasks already running.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.dispatch_loop.lock().unwrap_or_else(PoisonError::into_inner).take();
        match handle {
            Some(handle) => {
                if let Err(err) = handle.await {
                    tracing::warn!(error = %err, "Dispatch loop ended abnormally");
                }
            },
            None => {
                // Never started: nobody else will drain the queue.
                let receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let Some(mut receiver) = receiver {
                    drain(&mut receiver);
                }
            },
        }
        tracing::debug!("Dispatcher shut down");
    }

    /// Queue a job, waiting for room in the queue if necessary.
    pub async fn submit<F>(&self, job: F) -> Result<TaskHandle>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            exn::bail!(ErrorKind::Closed);
        }
        let state = self.new_state(None);
        let queued = Queued { state: Arc::clone(&state), job: Box::pin(job) };
        if self.sender.send(queued).await.is_err() {
            state.finish();
            exn::bail!(ErrorKind::Closed);
        }
        Ok(TaskHandle(state))
    }

    /// Queue a job if there is room right now.
    pub fn try_submit<F>(&self, job: F) -> Option<TaskHandle>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let state = self.new_state(None);
        self.enqueue(state, job)
    }

    /// Queue a job under `key`, unless a task for `key` is already queued or
    /// running, in which case that task's handle is returned.
    ///
    /// Returns `None` when the queue is full.
    pub fn try_submit_keyed<F>(&self, key: impl Into<String>, job: F) -> Option<TaskHandle>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        let state = {
            let mut registry = lock(&self.registry);
            if let Some(existing) = registry.get(&key) {
                tracing::trace!(key = %key, "Joining existing task");
                return Some(TaskHandle(Arc::clone(existing)));
            }
            let state = self.new_state(Some(key.clone()));
            registry.insert(key, Arc::clone(&state));
            state
        };
        self.enqueue(state, job)
    }

    fn new_state(&self, key: Option<String>) -> Arc<TaskState> {
        TaskState::new(self.next_id.fetch_add(1, Ordering::Relaxed), key, &self.registry)
    }

    fn enqueue<F>(&self, state: Arc<TaskState>, job: F) -> Option<TaskHandle>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let queued = Queued { state: Arc::clone(&state), job: Box::pin(job) };
        match self.sender.try_send(queued) {
            Ok(()) => Some(TaskHandle(state)),
            Err(_) => {
                tracing::debug!(key = ?state.key(), "Task queue full or closed, dropping task");
                // Wakes anyone who joined the task in the meantime.
                state.finish();
                None
            },
        }
    }
}

async fn dispatch(mut receiver: mpsc::Receiver<Queued>, semaphore: Arc<Semaphore>, cancel: CancellationToken) {
    let mut running = JoinSet::new();
    loop {
        let queued = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            queued = receiver.recv() => match queued {
                Some(queued) => queued,
                None => break,
            },
        };
        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                queued.state.finish();
                break;
            },
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    queued.state.finish();
                    break;
                },
            },
        };
        running.spawn(async move {
            let _permit = permit;
            queued.run().await;
        });
        while let Some(result) = running.try_join_next() {
            log_join(result);
        }
    }
    drain(&mut receiver);
    while let Some(result) = running.join_next().await {
        log_join(result);
    }
}

/// Close the queue and finish everything left in it without running it.
fn drain(receiver: &mut mpsc::Receiver<Queued>) {
    receiver.close();
    let mut dropped = 0usize;
    while let Ok(queued) = receiver.try_recv() {
        queued.state.finish();
        dropped += 1;
    }
    if dropped > 0 {
        tracing::debug!(dropped, "Finished queued tasks without running them");
    }
}

fn log_join(result: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(err) = result {
        tracing::warn!(error = %err, "Task panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_keyed_submissions_are_deduplicated() {
        let dispatcher = Dispatcher::new(2, 4);
        dispatcher.start().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let (release, released) = oneshot::channel::<()>();

        let first = {
            let runs = Arc::clone(&runs);
            dispatcher.try_submit_keyed("a.jpeg", async move {
                runs.fetch_add(1, Ordering::SeqCst);
                let _ = released.await;
            })
        };
        let second = {
            let runs = Arc::clone(&runs);
            dispatcher.try_submit_keyed("a.jpeg", async move {
                runs.fetch_add(1, Ordering::SeqCst);
            })
        };
        let first = first.unwrap();
        assert_eq!(Some(&first), second.as_ref());

        release.send(()).unwrap();
        first.wait().await;
        assert!(first.is_finished());
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let third = dispatcher.try_submit_keyed("a.jpeg", async {}).unwrap();
        assert_ne!(first, third);
        third.wait().await;
        dispatcher.shutdown().await;
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(4)]
    #[tokio::test]
    async fn test_parallelism_is_bounded(#[case] max_parallel: usize) {
        let dispatcher = Dispatcher::new(max_parallel, 16);
        dispatcher.start().unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let (active, peak, runs) = (Arc::clone(&active), Arc::clone(&peak), Arc::clone(&runs));
            let handle = dispatcher
                .submit(async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    runs.fetch_add(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
            handles.push(handle);
        }
        for handle in &handles {
            handle.wait().await;
        }

        assert_eq!(runs.load(Ordering::SeqCst), 10);
        assert!(peak.load(Ordering::SeqCst) <= max_parallel);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_queue_rejects_and_releases_key() {
        // Not started, so nothing leaves the queue.
        let dispatcher = Dispatcher::new(1, 1);
        let queued = dispatcher.try_submit_keyed("a", async {}).unwrap();
        assert!(dispatcher.try_submit_keyed("b", async {}).is_none());
        assert!(dispatcher.try_submit(async {}).is_none());
        assert!(!lock(&dispatcher.registry).contains_key("b"));
        assert!(lock(&dispatcher.registry).contains_key("a"));
        assert!(!queued.is_finished());

        dispatcher.shutdown().await;
        assert!(queued.is_finished());
        assert!(lock(&dispatcher.registry).is_empty());
    }

    #[tokio::test]
    async fn test_blocking_submit_waits_for_queue_room() {
        // Not started: the single queue slot stays taken until the loop runs.
        let dispatcher = Arc::new(Dispatcher::new(1, 1));
        let queued = dispatcher.try_submit(async {}).unwrap();
        let blocked = {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.submit(async {}).await.ok() })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());

        dispatcher.start().unwrap();
        let second = blocked.await.unwrap().unwrap();
        queued.wait().await;
        second.wait().await;
        assert!(queued.is_finished() && second.is_finished());
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_panicking_task_frees_key() {
        let dispatcher = Dispatcher::new(1, 4);
        dispatcher.start().unwrap();
        let handle = dispatcher.try_submit_keyed("boom", async { panic!("payload failure") }).unwrap();
        handle.wait().await;
        assert!(handle.is_finished());

        let retry = dispatcher.try_submit_keyed("boom", async {}).unwrap();
        assert_ne!(handle, retry);
        retry.wait().await;
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_finishes_queued_tasks_without_running_them() {
        let dispatcher = Dispatcher::new(1, 4);
        dispatcher.start().unwrap();
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let blocker = dispatcher
            .submit(async move {
                let _ = started_tx.send(());
                tokio::time::sleep(Duration::from_millis(50)).await;
            })
            .await
            .unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let mut queued = Vec::new();
        for key in ["x", "y", "z"] {
            let ran = Arc::clone(&ran);
            queued.push(dispatcher.try_submit_keyed(key, async move { ran.store(true, Ordering::SeqCst) }).unwrap());
        }
        started_rx.await.unwrap();

        dispatcher.shutdown().await;
        assert!(blocker.is_finished());
        assert!(queued.iter().all(TaskHandle::is_finished));
        assert!(!ran.load(Ordering::SeqCst));
        assert!(lock(&dispatcher.registry).is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_errors() {
        let dispatcher = Dispatcher::new(1, 1);
        dispatcher.start().unwrap();
        let err = dispatcher.start().unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyStarted));

        dispatcher.shutdown().await;
        let err = dispatcher.submit(async {}).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Closed));
        assert!(dispatcher.try_submit_keyed("late", async {}).is_none());
    }
}
