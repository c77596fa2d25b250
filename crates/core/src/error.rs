#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// `id` is the identifier as the caller gave it, which may not even
    /// parse as a [`crate::types::JobId`].
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The requested payload does not exist yet (job not enhanced).
    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
