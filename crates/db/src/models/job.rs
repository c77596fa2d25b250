//! Job entity models and DTOs.

use clearwave_core::job_status::JobStatus;
use clearwave_core::types::{JobId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A full row from the `jobs` table, payloads included.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: JobId,
    pub original_filename: String,
    #[serde(skip)]
    pub original_payload: Vec<u8>,
    #[serde(skip)]
    pub result_payload: Option<Vec<u8>>,
    pub size: i64,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    pub error_detail: Option<String>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// A `jobs` row without its binary payloads.
///
/// Status polls and listings read this shape so they never pull audio
/// bytes off disk.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobSummary {
    pub id: JobId,
    pub original_filename: String,
    pub size: i64,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    pub error_detail: Option<String>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl From<Job> for JobSummary {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            original_filename: job.original_filename,
            size: job.size,
            status: job.status,
            error_detail: job.error_detail,
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

/// Input for creating a job from a validated upload.
#[derive(Debug)]
pub struct NewJob {
    pub original_filename: String,
    pub payload: Vec<u8>,
}

/// The mutable columns of a job, written together by a single
/// conditional update.
#[derive(Debug, Clone)]
pub struct JobPatch {
    pub status: JobStatus,
    pub error_detail: Option<String>,
    pub result_payload: Option<Vec<u8>>,
    pub completed_at: Option<Timestamp>,
}

/// One payload read for the delivery endpoints.
#[derive(Debug, Clone, FromRow)]
pub struct StoredPayload {
    pub original_filename: String,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    /// `None` when the requested payload does not exist yet.
    pub bytes: Option<Vec<u8>>,
}

/// Query parameters for `GET /api/v1/files`.
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    /// Maximum number of results. Defaults to 20, capped at 100.
    pub limit: Option<i64>,
}
