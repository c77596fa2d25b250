//! Upload validation rules.
//!
//! Validation failures are rejected before a job record exists, so every
//! function here is pure and returns [`CoreError::Validation`].

use crate::error::CoreError;

/// The only accepted container format.
pub const ALLOWED_EXTENSIONS: &[&str] = &["wav"];

/// Default upper bound on an uploaded file (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Matches the width of the `original_filename` column.
const MAX_FILENAME_LEN: usize = 255;

/// Normalise and validate a client-supplied filename.
///
/// Directory components are stripped (browsers on some platforms send a
/// full path) and the extension must be one of [`ALLOWED_EXTENSIONS`],
/// compared case-insensitively.
pub fn validate_filename(raw: &str) -> Result<String, CoreError> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() {
        return Err(CoreError::Validation("Filename must not be empty".into()));
    }
    if name.chars().count() > MAX_FILENAME_LEN {
        return Err(CoreError::Validation(format!(
            "Filename must not exceed {MAX_FILENAME_LEN} characters"
        )));
    }

    let ext = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    };
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(CoreError::Validation(
            "Invalid file. Only .wav files are supported.".into(),
        ));
    }

    Ok(name.to_string())
}

/// Reject a body once its running size passes `max_bytes`.
///
/// Called per received chunk so oversized uploads fail before they are
/// fully buffered.
pub fn ensure_within_limit(received: usize, max_bytes: usize) -> Result<(), CoreError> {
    if received > max_bytes {
        return Err(too_large(max_bytes));
    }
    Ok(())
}

/// The error reported for any upload over `max_bytes`.
pub fn too_large(max_bytes: usize) -> CoreError {
    CoreError::Validation(format!(
        "File too large. Maximum size is {}MB",
        max_bytes / (1024 * 1024)
    ))
}

/// Final check once the whole body has been received.
pub fn validate_payload(len: usize, max_bytes: usize) -> Result<(), CoreError> {
    if len == 0 {
        return Err(CoreError::Validation("Empty file uploaded".into()));
    }
    ensure_within_limit(len, max_bytes)
}
