//! Handlers for uploading audio, tracking enhancement jobs, and delivering
//! the stored payloads.
//!
//! Payload reads always go to the record store; there is no cache of job
//! state in the process.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{self, HeaderValue};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use bytes::Bytes;
use clearwave_core::error::CoreError;
use clearwave_core::job_status::JobStatus;
use clearwave_core::payload::{enhanced_filename, PayloadKind, AUDIO_CONTENT_TYPE};
use clearwave_core::types::{JobId, Timestamp};
use clearwave_core::upload::{ensure_within_limit, too_large, validate_filename, validate_payload};
use clearwave_db::models::job::{JobListQuery, JobSummary, NewJob, StoredPayload};
use clearwave_db::repositories::JobRepo;
use clearwave_worker::DispatchError;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Size of each body frame when streaming a payload.
const STREAM_CHUNK_BYTES: usize = 64 * 1024;

/// Multipart field carrying the audio file.
const FILE_FIELD: &str = "file";

// ---------------------------------------------------------------------------
// Response / query types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: JobId,
    pub filename: String,
    pub size: i64,
    pub status: JobStatus,
    pub message: &'static str,
}

/// Job view returned by `GET /status/{id}`.
#[derive(Debug, Serialize)]
pub struct JobStatusView {
    pub id: JobId,
    pub filename: String,
    pub size: i64,
    pub status: JobStatus,
    /// Human-readable text for the current status.
    pub progress: &'static str,
    pub error_detail: Option<String>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl From<JobSummary> for JobStatusView {
    fn from(job: JobSummary) -> Self {
        Self {
            id: job.id,
            filename: job.original_filename,
            size: job.size,
            status: job.status,
            progress: job.status.progress_message(),
            error_detail: job.error_detail,
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// `original` or `enhanced` (default).
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/upload
///
/// Accepts a multipart form with a required `file` field holding a `.wav`
/// file. The body is read chunk by chunk and rejected as soon as it grows
/// past the configured limit. The new job is queued for enhancement before
/// the response is sent; the request never waits for the model or for queue
/// space. A full queue is reported as `503 QUEUE_FULL` and no job is kept.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<DataResponse<UploadResponse>>> {
    let max_bytes = state.config.max_upload_bytes;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = validate_filename(field.file_name().unwrap_or_default())?;
        let mut data = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?
        {
            ensure_within_limit(data.len() + chunk.len(), max_bytes)?;
            data.extend_from_slice(&chunk);
        }
        file = Some((filename, data));
    }

    let (filename, data) = file
        .ok_or_else(|| AppError::BadRequest(format!("Missing required '{FILE_FIELD}' field")))?;
    validate_payload(data.len(), max_bytes)?;

    if !state.dispatcher.has_capacity() {
        return Err(DispatchError::QueueFull.into());
    }

    let job = JobRepo::create(
        &state.pool,
        &NewJob {
            original_filename: filename,
            payload: data,
        },
    )
    .await?;
    tracing::info!(job_id = %job.id, size = job.size, filename = %job.original_filename, "Audio uploaded");

    // Another upload may have taken the last slot since the check above.
    // A job that cannot be queued is removed rather than left waiting.
    if let Err(e) = state.dispatcher.try_submit(job.id) {
        tracing::warn!(job_id = %job.id, error = %e, "Failed to queue job, discarding upload");
        JobRepo::delete(&state.pool, job.id).await?;
        return Err(e.into());
    }

    Ok(Json(DataResponse {
        data: UploadResponse {
            id: job.id,
            filename: job.original_filename,
            size: job.size,
            status: job.status,
            message: "File uploaded successfully. Enhancement in progress.",
        },
    }))
}

/// GET /api/v1/status/{id}
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<JobStatusView>>> {
    let id = parse_job_id(&id)?;
    let job = JobRepo::find_summary(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: job.into() }))
}

/// GET /api/v1/download/{id}
///
/// The enhanced audio as an attachment named `<stem>_enhanced.wav`.
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_job_id(&id)?;
    let stored = load_payload(&state, id, PayloadKind::Enhanced).await?;
    let filename = enhanced_filename(&stored.original_filename);
    let bytes = require_bytes(stored)?;

    payload_response(
        bytes,
        format!("attachment; filename=\"{}\"", header_safe(&filename)),
    )
}

/// GET /api/v1/stream/{id}?type=original|enhanced
///
/// Either payload, inline, for in-browser playback.
pub async fn stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<StreamQuery>, QueryRejection>,
) -> AppResult<Response> {
    let id = parse_job_id(&id)?;
    let Query(query) = query.map_err(bad_query)?;
    let kind = match query.kind.as_deref() {
        None => PayloadKind::Enhanced,
        Some(raw) => raw.parse::<PayloadKind>()?,
    };

    let stored = load_payload(&state, id, kind).await?;
    let filename = match kind {
        PayloadKind::Original => stored.original_filename.clone(),
        PayloadKind::Enhanced => enhanced_filename(&stored.original_filename),
    };
    let bytes = require_bytes(stored)?;

    let mut response =
        payload_response(bytes, format!("inline; filename=\"{}\"", header_safe(&filename)))?;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok(response)
}

/// GET /api/v1/files?limit=N
///
/// Most recent jobs first, without payloads.
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<JobListQuery>, QueryRejection>,
) -> AppResult<Json<DataResponse<Vec<JobStatusView>>>> {
    let Query(query) = query.map_err(bad_query)?;
    let jobs = JobRepo::list_recent(&state.pool, query.limit).await?;
    Ok(Json(DataResponse {
        data: jobs.into_iter().map(JobStatusView::from).collect(),
    }))
}

/// DELETE /api/v1/files/{id}
///
/// Removes the job and both payloads. A job that is still processing is
/// deleted as well; its runner discards the result when it finishes.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_job_id(&id)?;
    if !JobRepo::delete(&state.pool, id).await? {
        return Err(not_found(id));
    }
    tracing::info!(job_id = %id, "Job deleted");
    Ok(Json(MessageResponse {
        message: "Audio file deleted successfully",
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// An id that does not parse cannot name a stored job, so it is reported
/// exactly like an unknown one.
fn parse_job_id(raw: &str) -> AppResult<JobId> {
    raw.parse::<JobId>().map_err(|_| not_found(raw))
}

fn bad_query(rejection: QueryRejection) -> AppError {
    AppError::BadRequest(rejection.body_text())
}

/// The body limit layer reports oversized requests as a multipart error;
/// surface those with the same message as the per-chunk check.
fn multipart_error(err: MultipartError, max_bytes: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return too_large(max_bytes).into();
    }
    AppError::BadRequest(err.body_text())
}

fn not_found(id: impl std::fmt::Display) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Job",
        id: id.to_string(),
    })
}

async fn load_payload(state: &AppState, id: JobId, kind: PayloadKind) -> AppResult<StoredPayload> {
    JobRepo::find_payload(&state.pool, id, kind)
        .await?
        .ok_or_else(|| not_found(id))
}

/// The requested bytes, or `NOT_READY` when the payload does not exist yet.
fn require_bytes(stored: StoredPayload) -> AppResult<Bytes> {
    match stored.bytes {
        Some(bytes) if !bytes.is_empty() => Ok(Bytes::from(bytes)),
        _ => Err(AppError::Core(CoreError::NotReady(format!(
            "Enhanced audio not available. Job is {}; check processing status.",
            stored.status
        )))),
    }
}

/// A `200 audio/wav` response whose body is sent in fixed-size frames
/// sliced from `bytes` without copying.
fn payload_response(bytes: Bytes, disposition: String) -> AppResult<Response> {
    let length = bytes.len();
    let frames = (0..length)
        .step_by(STREAM_CHUNK_BYTES)
        .map(move |start| {
            let end = (start + STREAM_CHUNK_BYTES).min(length);
            Ok::<_, Infallible>(bytes.slice(start..end))
        });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, AUDIO_CONTENT_TYPE)
        .header(header::CONTENT_LENGTH, length.to_string())
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(futures::stream::iter(frames)))
        .map_err(|e| AppError::InternalError(e.to_string()))
}

/// Reduce a filename to something that fits in a quoted header parameter.
fn header_safe(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_safe_drops_quotes_and_controls() {
        assert_eq!(header_safe("a\"b\\c\r\n.wav"), "abc.wav");
        assert_eq!(header_safe("plain.wav"), "plain.wav");
        assert_eq!(header_safe("café.wav"), "caf_.wav");
    }

    #[test]
    fn unparseable_job_id_is_not_found() {
        assert!(matches!(
            parse_job_id("not-a-uuid"),
            Err(AppError::Core(CoreError::NotFound { ref id, .. })) if id == "not-a-uuid"
        ));
        assert!(parse_job_id("67e55044-10b1-426f-9247-bb680e5fe0c8").is_ok());
    }
}
