//! Job state machine transitions.
//!
//! Every status change after creation goes through [`JobLifecycle`]. Each
//! transition is a single conditional update on the record store, so the
//! precondition check and the write cannot interleave with another writer
//! on the same id.
//!
//! Transitions out of a terminal state are rejected, not ignored: a second
//! `mark_enhanced` or `mark_error` returns [`TransitionError::InvalidTransition`]
//! and leaves the record exactly as it was.

use chrono::Utc;
use clearwave_core::job_status::JobStatus;
use clearwave_core::types::JobId;
use sqlx::SqlitePool;

use crate::models::job::{JobPatch, JobSummary};
use crate::repositories::{JobRepo, UpdateOutcome};

/// Stored when a caller reports a failure without any description.
pub const FALLBACK_ERROR_DETAIL: &str = "Enhancement failed for an unknown reason";

/// Why a transition was not applied.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Invalid result payload: {0}")]
    InvalidPayload(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// State machine operations over the `jobs` table.
pub struct JobLifecycle;

impl JobLifecycle {
    /// `uploaded -> processing`.
    pub async fn mark_processing(
        pool: &SqlitePool,
        id: JobId,
    ) -> Result<JobSummary, TransitionError> {
        let patch = JobPatch {
            status: JobStatus::Processing,
            error_detail: None,
            result_payload: None,
            completed_at: None,
        };
        Self::transition(pool, id, patch).await
    }

    /// `processing -> enhanced`, storing the result and the completion time.
    pub async fn mark_enhanced(
        pool: &SqlitePool,
        id: JobId,
        result: Vec<u8>,
    ) -> Result<JobSummary, TransitionError> {
        if result.is_empty() {
            return Err(TransitionError::InvalidPayload(
                "enhanced audio must not be empty".into(),
            ));
        }
        let patch = JobPatch {
            status: JobStatus::Enhanced,
            error_detail: None,
            result_payload: Some(result),
            completed_at: Some(Utc::now()),
        };
        Self::transition(pool, id, patch).await
    }

    /// `processing -> error`, recording why.
    ///
    /// `completed_at` is set here as well: it marks when the job reached a
    /// terminal state, successful or not.
    pub async fn mark_error(
        pool: &SqlitePool,
        id: JobId,
        detail: &str,
    ) -> Result<JobSummary, TransitionError> {
        let detail = detail.trim();
        let detail = if detail.is_empty() {
            FALLBACK_ERROR_DETAIL
        } else {
            detail
        };
        let patch = JobPatch {
            status: JobStatus::Error,
            error_detail: Some(detail.to_string()),
            result_payload: None,
            completed_at: Some(Utc::now()),
        };
        Self::transition(pool, id, patch).await
    }

    async fn transition(
        pool: &SqlitePool,
        id: JobId,
        patch: JobPatch,
    ) -> Result<JobSummary, TransitionError> {
        let to = patch.status;
        let Some(from) = to.required_predecessor() else {
            return Err(TransitionError::InvalidTransition {
                id,
                from: to,
                to,
            });
        };

        match JobRepo::update(pool, id, from, &patch).await? {
            UpdateOutcome::Applied(job) => {
                tracing::debug!(job_id = %id, %from, %to, "Job transitioned");
                Ok(job)
            }
            UpdateOutcome::NotFound => Err(TransitionError::NotFound(id)),
            UpdateOutcome::StatusMismatch(actual) => Err(TransitionError::InvalidTransition {
                id,
                from: actual,
                to,
            }),
        }
    }
}
