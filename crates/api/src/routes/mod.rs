pub mod files;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /upload                    upload a .wav and start enhancement (POST)
/// /status/{id}               job status and progress text (GET)
/// /download/{id}             enhanced audio as attachment (GET)
/// /stream/{id}?type=         original or enhanced audio, inline (GET)
/// /files                     recent jobs, newest first (GET)
/// /files/{id}                delete job and audio (DELETE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(files::router())
}
