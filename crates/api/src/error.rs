use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use clearwave_core::error::CoreError;
use clearwave_worker::DispatchError;
use serde_json::json;
use sqlx::error::ErrorKind;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce `{ "error": ..., "code": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `clearwave_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The job could not be handed to the background workers.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A malformed request (bad multipart body, bad query string).
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::NotReady(msg) => (StatusCode::BAD_REQUEST, "NOT_READY", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        INTERNAL_MESSAGE.to_string(),
                    )
                }
            },

            AppError::Database(err) => classify_sqlx_error(err),

            AppError::Dispatch(DispatchError::QueueFull) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "QUEUE_FULL",
                "Enhancement queue is full. Please try again later.".to_string(),
            ),
            AppError::Dispatch(err) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                err.to_string(),
            ),

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    INTERNAL_MESSAGE.to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) if matches!(db_err.kind(), ErrorKind::UniqueViolation) => (
            StatusCode::CONFLICT,
            "CONFLICT",
            "Duplicate value violates a unique constraint".to_string(),
        ),
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                INTERNAL_MESSAGE.to_string(),
            )
        }
    }
}
