//! Repository for the `jobs` table.
//!
//! Status columns are always written through [`JobStatus::as_str`]; no
//! status literal appears in a query string.

use chrono::Utc;
use clearwave_core::job_status::JobStatus;
use clearwave_core::payload::PayloadKind;
use clearwave_core::types::{new_job_id, JobId};
use sqlx::SqlitePool;

use crate::models::job::{Job, JobPatch, JobSummary, NewJob, StoredPayload};

/// Column list for full `jobs` reads.
const COLUMNS: &str = "\
    id, original_filename, original_payload, result_payload, size, \
    status, error_detail, created_at, completed_at";

/// Column list for payload-free reads.
const SUMMARY_COLUMNS: &str = "\
    id, original_filename, size, status, error_detail, created_at, completed_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
pub const DEFAULT_LIMIT: i64 = 20;

/// Result of a conditional update.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// The row was in the expected status and now holds the patch.
    Applied(JobSummary),
    /// No row with that id exists.
    NotFound,
    /// The row exists but was in another status; nothing was written.
    StatusMismatch(JobStatus),
}

/// Provides CRUD operations for enhancement jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new job in `uploaded` status.
    pub async fn create(pool: &SqlitePool, input: &NewJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (id, original_filename, original_payload, size, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(new_job_id())
            .bind(&input.original_filename)
            .bind(&input.payload)
            .bind(input.payload.len() as i64)
            .bind(JobStatus::Uploaded.as_str())
            .bind(Utc::now())
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID, payloads included.
    pub async fn find_by_id(pool: &SqlitePool, id: JobId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = ?");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a job by its ID without loading either payload.
    pub async fn find_summary(
        pool: &SqlitePool,
        id: JobId,
    ) -> Result<Option<JobSummary>, sqlx::Error> {
        let query = format!("SELECT {SUMMARY_COLUMNS} FROM jobs WHERE id = ?");
        sqlx::query_as::<_, JobSummary>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Read the status together with exactly one payload.
    pub async fn find_payload(
        pool: &SqlitePool,
        id: JobId,
        kind: PayloadKind,
    ) -> Result<Option<StoredPayload>, sqlx::Error> {
        let column = match kind {
            PayloadKind::Original => "original_payload",
            PayloadKind::Enhanced => "result_payload",
        };
        let query = format!(
            "SELECT original_filename, status, {column} AS bytes FROM jobs WHERE id = ?"
        );
        sqlx::query_as::<_, StoredPayload>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List the most recent jobs, newest first.
    pub async fn list_recent(
        pool: &SqlitePool,
        limit: Option<i64>,
    ) -> Result<Vec<JobSummary>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let query = format!(
            "SELECT {SUMMARY_COLUMNS} FROM jobs \
             ORDER BY created_at DESC, rowid DESC \
             LIMIT ?"
        );
        sqlx::query_as::<_, JobSummary>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// IDs of every job currently in `status`, oldest first.
    pub async fn list_ids_by_status(
        pool: &SqlitePool,
        status: JobStatus,
    ) -> Result<Vec<JobId>, sqlx::Error> {
        sqlx::query_scalar::<_, JobId>(
            "SELECT id FROM jobs WHERE status = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(status.as_str())
        .fetch_all(pool)
        .await
    }

    /// Atomically apply `patch` if the job is currently in `expected`.
    ///
    /// The check and the write are one statement, so two callers racing on
    /// the same id cannot both succeed from the same starting status. When
    /// nothing was written a second read tells the caller why.
    pub async fn update(
        pool: &SqlitePool,
        id: JobId,
        expected: JobStatus,
        patch: &JobPatch,
    ) -> Result<UpdateOutcome, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status = ?, error_detail = ?, result_payload = ?, completed_at = ? \
             WHERE id = ? AND status = ? \
             RETURNING {SUMMARY_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, JobSummary>(&query)
            .bind(patch.status.as_str())
            .bind(&patch.error_detail)
            .bind(&patch.result_payload)
            .bind(patch.completed_at)
            .bind(id)
            .bind(expected.as_str())
            .fetch_optional(pool)
            .await?;

        if let Some(job) = updated {
            return Ok(UpdateOutcome::Applied(job));
        }

        let current = sqlx::query_scalar::<_, String>("SELECT status FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        match current {
            None => Ok(UpdateOutcome::NotFound),
            Some(raw) => {
                let status = raw
                    .parse::<JobStatus>()
                    .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
                Ok(UpdateOutcome::StatusMismatch(status))
            }
        }
    }

    /// Delete a job and both payloads. Returns `true` if a row was removed.
    pub async fn delete(pool: &SqlitePool, id: JobId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
