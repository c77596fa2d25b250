use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::files;
use crate::state::AppState;

/// Upload, status, delivery and deletion routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(files::upload))
        .route("/status/{id}", get(files::status))
        .route("/download/{id}", get(files::download))
        .route("/stream/{id}", get(files::stream))
        .route("/files", get(files::list))
        .route("/files/{id}", delete(files::delete))
}
