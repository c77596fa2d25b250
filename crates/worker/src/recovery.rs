//! Startup reconciliation of jobs left behind by a previous process.
//!
//! A job found in `processing` lost its worker when the process stopped and
//! can never complete; it is failed with [`INTERRUPTED_DETAIL`]. A job still
//! in `uploaded` was accepted but never started, so it is submitted again.
//!
//! Resubmission runs on a background task: the backlog may be larger than
//! the queue, and the server must not wait for workers to drain it before
//! it starts accepting requests.

use std::sync::Arc;

use clearwave_core::job_status::JobStatus;
use clearwave_core::types::JobId;
use clearwave_db::repositories::JobRepo;
use clearwave_db::{JobLifecycle, TransitionError};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;

use crate::dispatcher::{DispatchError, TaskDispatcher};

pub const INTERRUPTED_DETAIL: &str = "Processing was interrupted by a server restart";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Jobs moved from `processing` to `error`.
    pub interrupted: usize,
    /// `uploaded` jobs handed to the background resubmission task.
    pub resubmitted: usize,
}

/// What [`recover`] did, plus the task still feeding the backlog to the
/// dispatcher. Dropping `resubmission` detaches it.
#[derive(Debug)]
pub struct Recovery {
    pub report: RecoveryReport,
    pub resubmission: JoinHandle<()>,
}

#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Reconcile stale jobs. Call once, after migrations and before serving.
///
/// Returns as soon as interrupted jobs are failed; waiting jobs are queued
/// by the returned background task.
pub async fn recover(
    pool: &SqlitePool,
    dispatcher: &Arc<TaskDispatcher>,
) -> Result<Recovery, RecoveryError> {
    if dispatcher.is_shutting_down() {
        return Err(DispatchError::ShuttingDown.into());
    }
    let mut report = RecoveryReport::default();

    for job_id in JobRepo::list_ids_by_status(pool, JobStatus::Processing).await? {
        match JobLifecycle::mark_error(pool, job_id, INTERRUPTED_DETAIL).await {
            Ok(_) => report.interrupted += 1,
            Err(TransitionError::Database(e)) => return Err(e.into()),
            // Deleted or finished since the listing.
            Err(e) => tracing::debug!(%job_id, error = %e, "Skipped interrupted job"),
        }
    }

    let waiting = JobRepo::list_ids_by_status(pool, JobStatus::Uploaded).await?;
    report.resubmitted = waiting.len();

    if report != RecoveryReport::default() {
        tracing::info!(
            interrupted = report.interrupted,
            resubmitted = report.resubmitted,
            "Recovered jobs from previous run",
        );
    }

    let resubmission = tokio::spawn(resubmit(Arc::clone(dispatcher), waiting));
    Ok(Recovery {
        report,
        resubmission,
    })
}

/// Feed `waiting` to the dispatcher, oldest first, waiting for queue space
/// as workers free it.
async fn resubmit(dispatcher: Arc<TaskDispatcher>, waiting: Vec<JobId>) {
    let total = waiting.len();
    for (queued, job_id) in waiting.into_iter().enumerate() {
        if let Err(e) = dispatcher.submit(job_id).await {
            // Only shutdown stops this loop. The remaining jobs are still
            // `uploaded` and the next start picks them up again.
            tracing::warn!(
                %job_id,
                error = %e,
                remaining = total - queued,
                "Stopped resubmitting recovered jobs",
            );
            return;
        }
    }
    if total > 0 {
        tracing::debug!(total, "Recovered jobs queued");
    }
}
