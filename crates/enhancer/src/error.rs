/// Errors crossing the enhancer boundary.
#[derive(Debug, thiserror::Error)]
pub enum EnhanceError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The model service returned a non-2xx status code.
    #[error("Model service error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The model command exited unsuccessfully.
    #[error("Model command failed: {0}")]
    Process(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bytes that should have been a WAV file were not.
    #[error("Invalid WAV data: {0}")]
    Wav(#[from] hound::Error),

    /// The model answered, but not with usable audio.
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    /// The process-wide handle was shut down.
    #[error("Enhancement model has been shut down")]
    Stopped,
}
