//! Bounded queue plus a fixed pool of worker tasks.
//!
//! Submissions for an id that is already queued or running are collapsed,
//! so a job never executes twice concurrently within this process. Each
//! execution runs in its own spawned task: a panicking executor is logged
//! and the worker moves on to the next id.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use clearwave_core::types::JobId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::executor::JobExecutor;

/// Default number of concurrent model calls.
pub const DEFAULT_WORKERS: usize = 2;

/// Default number of ids that may wait for a worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Worker tasks draining the queue (at least 1).
    pub workers: usize,
    /// Queue slots; `submit` waits when all are taken (at least 1).
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Result of a successful [`TaskDispatcher::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued,
    /// The id was already queued or running; nothing was added.
    AlreadyQueued,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Dispatcher is shutting down")]
    ShuttingDown,

    #[error("Dispatcher queue is closed")]
    Closed,

    /// Every queue slot is taken; only returned by [`TaskDispatcher::try_submit`].
    #[error("Dispatcher queue is full")]
    QueueFull,
}

type InFlight = Arc<Mutex<HashSet<JobId>>>;

/// Accepts job ids and executes them on background worker tasks.
pub struct TaskDispatcher {
    sender: mpsc::Sender<JobId>,
    in_flight: InFlight,
    cancel: CancellationToken,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl TaskDispatcher {
    /// Spawn the worker pool. Must be called from within a tokio runtime.
    pub fn start(executor: Arc<dyn JobExecutor>, config: DispatcherConfig) -> Arc<Self> {
        let worker_count = config.workers.max(1);
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let in_flight: InFlight = Arc::new(Mutex::new(HashSet::new()));
        let cancel = CancellationToken::new();

        let workers = (0..worker_count)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&receiver),
                    Arc::clone(&executor),
                    Arc::clone(&in_flight),
                    cancel.clone(),
                ))
            })
            .collect();

        tracing::info!(
            workers = worker_count,
            queue_capacity = config.queue_capacity.max(1),
            "Task dispatcher started",
        );

        Arc::new(Self {
            sender,
            in_flight,
            cancel,
            workers: tokio::sync::Mutex::new(workers),
        })
    }

    /// Queue `job_id` for execution, waiting for a free slot if the queue
    /// is full.
    pub async fn submit(&self, job_id: JobId) -> Result<Submission, DispatchError> {
        if let Some(early) = self.precheck(job_id)? {
            return Ok(early);
        }

        // Reserve the slot before marking the id, so a caller that gives up
        // while waiting for space leaves nothing behind.
        let permit = self
            .sender
            .reserve()
            .await
            .map_err(|_| DispatchError::Closed)?;
        Ok(self.enqueue(permit, job_id))
    }

    /// Queue `job_id` only if a slot is free right now.
    ///
    /// Request handlers use this so a full queue is reported to the client
    /// instead of holding the request open.
    pub fn try_submit(&self, job_id: JobId) -> Result<Submission, DispatchError> {
        if let Some(early) = self.precheck(job_id)? {
            return Ok(early);
        }

        let permit = self.sender.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => DispatchError::QueueFull,
            mpsc::error::TrySendError::Closed(()) => DispatchError::Closed,
        })?;
        Ok(self.enqueue(permit, job_id))
    }

    /// Whether [`try_submit`](Self::try_submit) would currently find a free
    /// slot.
    pub fn has_capacity(&self) -> bool {
        !self.cancel.is_cancelled() && self.sender.capacity() > 0
    }

    fn precheck(&self, job_id: JobId) -> Result<Option<Submission>, DispatchError> {
        if self.cancel.is_cancelled() {
            return Err(DispatchError::ShuttingDown);
        }
        if lock(&self.in_flight).contains(&job_id) {
            tracing::debug!(%job_id, "Job already queued");
            return Ok(Some(Submission::AlreadyQueued));
        }
        Ok(None)
    }

    fn enqueue(&self, permit: mpsc::Permit<'_, JobId>, job_id: JobId) -> Submission {
        if !lock(&self.in_flight).insert(job_id) {
            tracing::debug!(%job_id, "Job already queued");
            return Submission::AlreadyQueued;
        }
        permit.send(job_id);

        tracing::debug!(%job_id, "Job queued");
        Submission::Queued
    }

    /// Ids currently queued or running.
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop accepting work and wait up to `timeout` for workers to finish
    /// the job each is currently running. Queued ids that never started
    /// stay `uploaded` in the store and are picked up by recovery on the
    /// next start.
    pub async fn shutdown(&self, timeout: Duration) {
        self.cancel.cancel();
        let handles: Vec<_> = self.workers.lock().await.drain(..).collect();
        if handles.is_empty() {
            return;
        }

        tracing::info!(workers = handles.len(), "Waiting for workers to finish");
        match tokio::time::timeout(timeout, futures::future::join_all(handles)).await {
            Ok(_) => tracing::info!("Task dispatcher stopped"),
            Err(_) => tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Workers did not finish before the shutdown timeout",
            ),
        }
    }
}

fn lock(in_flight: &InFlight) -> std::sync::MutexGuard<'_, HashSet<JobId>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<JobId>>>,
    executor: Arc<dyn JobExecutor>,
    in_flight: InFlight,
    cancel: CancellationToken,
) {
    tracing::debug!(worker_id, "Worker started");

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => None,
            job_id = async { receiver.lock().await.recv().await } => job_id,
        };
        let Some(job_id) = next else {
            break;
        };

        let task_executor = Arc::clone(&executor);
        let task = tokio::spawn(async move { task_executor.execute(job_id).await });
        match task.await {
            Ok(()) => {}
            Err(e) if e.is_panic() => {
                tracing::error!(worker_id, %job_id, "Job execution panicked");
            }
            Err(e) => {
                tracing::error!(worker_id, %job_id, error = %e, "Job execution aborted");
            }
        }
        lock(&in_flight).remove(&job_id);
    }

    tracing::debug!(worker_id, "Worker stopped");
}
