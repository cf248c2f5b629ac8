//! Serialised execution of refresh tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::refresh::{RefreshOutcome, RefreshTask, Refresher};

/// Default capacity of the task queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Errors raised when handing a task to the queue.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Too many tasks are already waiting.
    #[error("refresh queue is full")]
    Full,
    /// The queue is shutting down.
    #[error("refresh queue is closed")]
    Closed,
    /// The worker stopped before reporting the task outcome.
    #[error("refresh task was dropped before completion")]
    Dropped,
}

/// Completion handle of a submitted task.
#[derive(Debug)]
pub struct RefreshHandle {
    receiver: oneshot::Receiver<RefreshOutcome>,
}

impl RefreshHandle {
    /// Wait for the task to run.
    pub async fn wait(self) -> Result<RefreshOutcome, QueueError> {
        self.receiver.await.map_err(|_| QueueError::Dropped)
    }
}

struct RefreshEnvelope {
    task: RefreshTask,
    respond_to: Option<oneshot::Sender<RefreshOutcome>>,
}

/// Queue feeding refresh tasks to a single consumer.
///
/// Tasks run one at a time in submission order, so two triggers for the
/// same target never reach upstream concurrently: the second one sees the
/// fresh timestamp left by the first and is throttled.
pub struct RefreshQueue {
    inner: Arc<RefreshQueueInner>,
}

struct RefreshQueueInner {
    sender: mpsc::Sender<RefreshEnvelope>,
    queue_depth: Arc<AtomicUsize>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for RefreshQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshQueue")
            .field("queue_depth", &self.queue_depth())
            .finish_non_exhaustive()
    }
}

impl RefreshQueue {
    /// Spawn the consumer on the current tokio runtime.
    pub fn spawn(refresher: Arc<Refresher>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let queue_depth = Arc::new(AtomicUsize::new(0));
        let inner = Arc::new(RefreshQueueInner {
            sender,
            queue_depth: Arc::clone(&queue_depth),
            shutdown: Mutex::new(Some(shutdown_tx)),
            handle: Mutex::new(None),
        });

        let worker = RefreshWorker {
            refresher,
            queue_depth,
        };
        let handle = tokio::spawn(worker.run(receiver, shutdown_rx));
        *lock(&inner.handle) = Some(handle);

        Self { inner }
    }

    /// Submit a task without waiting for it.
    pub fn submit(&self, task: RefreshTask) -> Result<(), QueueError> {
        self.enqueue(RefreshEnvelope {
            task,
            respond_to: None,
        })
    }

    /// Submit a task and get a handle resolving once it ran.
    pub fn submit_with_handle(&self, task: RefreshTask) -> Result<RefreshHandle, QueueError> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(RefreshEnvelope {
            task,
            respond_to: Some(tx),
        })?;
        Ok(RefreshHandle { receiver: rx })
    }

    /// Submit a task and wait for its outcome.
    pub async fn refresh(&self, task: RefreshTask) -> Result<RefreshOutcome, QueueError> {
        self.submit_with_handle(task)?.wait().await
    }

    /// Number of tasks submitted but not yet completed.
    pub fn queue_depth(&self) -> usize {
        self.inner.queue_depth.load(Ordering::SeqCst)
    }

    /// Stop accepting tasks and wait up to `grace` for queued ones to finish.
    ///
    /// Returns `true` when the queue drained in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        if let Some(shutdown) = lock(&self.inner.shutdown).take() {
            let _ = shutdown.send(());
        }
        let Some(handle) = lock(&self.inner.handle).take() else {
            return true;
        };

        match tokio::time::timeout(grace, handle).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!(error = %err, "refresh worker terminated abnormally");
                false
            }
            Err(_) => {
                warn!(
                    pending = self.queue_depth(),
                    grace_ms = grace.as_millis(),
                    "refresh queue did not drain in time"
                );
                false
            }
        }
    }

    fn enqueue(&self, envelope: RefreshEnvelope) -> Result<(), QueueError> {
        let label = envelope.task.label();
        self.inner.queue_depth.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = self.inner.sender.try_send(envelope) {
            self.inner.queue_depth.fetch_sub(1, Ordering::SeqCst);
            let err = match err {
                mpsc::error::TrySendError::Full(_) => QueueError::Full,
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            };
            warn!(task = label, error = %err, "failed to schedule refresh task");
            return Err(err);
        }
        debug!(task = label, depth = self.queue_depth(), "scheduled refresh task");
        Ok(())
    }
}

struct RefreshWorker {
    refresher: Arc<Refresher>,
    queue_depth: Arc<AtomicUsize>,
}

impl RefreshWorker {
    async fn run(
        self,
        mut receiver: mpsc::Receiver<RefreshEnvelope>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    receiver.close();
                    break;
                }
                maybe_envelope = receiver.recv() => {
                    match maybe_envelope {
                        Some(envelope) => self.process(envelope).await,
                        None => return,
                    }
                }
            }
        }

        let pending = self.queue_depth.load(Ordering::SeqCst);
        info!(pending, "draining refresh queue");
        while let Some(envelope) = receiver.recv().await {
            self.process(envelope).await;
        }
        info!("refresh queue drained");
    }

    async fn process(&self, envelope: RefreshEnvelope) {
        let outcome = self.refresher.run(&envelope.task).await;
        self.queue_depth.fetch_sub(1, Ordering::SeqCst);
        debug!(task = %envelope.task, ?outcome, "refresh task completed");
        if let Some(respond_to) = envelope.respond_to {
            let _ = respond_to.send(outcome);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use git_compare_core::Providers;

    use crate::refresh::Throttle;
    use crate::store::CacheStore;

    fn queue() -> RefreshQueue {
        let refresher = Refresher::new(
            Arc::new(CacheStore::new()),
            Providers::new(),
            None,
            Throttle::default(),
        );
        RefreshQueue::spawn(Arc::new(refresher), 4)
    }

    #[tokio::test]
    async fn handle_reports_outcome() {
        let queue = queue();
        let outcome = queue.refresh(RefreshTask::Identities).await.expect("refresh");
        assert_eq!(outcome, RefreshOutcome::Unavailable);
        assert_eq!(queue.queue_depth(), 0);
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_rejected() {
        let queue = queue();
        assert!(queue.shutdown(Duration::from_secs(1)).await);
        assert_eq!(queue.submit(RefreshTask::Repositories), Err(QueueError::Closed));
    }

    #[tokio::test]
    async fn shutdown_drains_queued_tasks() {
        let queue = queue();
        let first = queue
            .submit_with_handle(RefreshTask::Identities)
            .expect("submit");
        let second = queue
            .submit_with_handle(RefreshTask::Repositories)
            .expect("submit");

        assert!(queue.shutdown(Duration::from_secs(1)).await);
        assert_eq!(first.wait().await, Ok(RefreshOutcome::Unavailable));
        assert!(second.wait().await.is_ok());
    }
}
