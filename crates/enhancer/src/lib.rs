//! Boundary to the external speech-enhancement model.
//!
//! The model itself is an opaque collaborator. This crate defines what the
//! rest of the system may ask of it ([`Enhancer`]), the audio shape crossing
//! that boundary ([`buffer::AudioBuffer`], 16 kHz mono), two ways of reaching
//! a real model runtime (HTTP service or local command), and the
//! process-wide [`handle::EnhancerHandle`] that owns whichever one is
//! configured.

pub mod buffer;
pub mod command;
pub mod config;
pub mod error;
pub mod handle;
pub mod http;

use std::path::Path;

use async_trait::async_trait;

pub use buffer::{AudioBuffer, TARGET_SAMPLE_RATE};
pub use config::EnhancerConfig;
pub use error::EnhanceError;
pub use handle::{EnhancerHandle, HandleStatus};

/// One enhancement call.
#[derive(Debug)]
pub struct EnhanceRequest<'a> {
    /// Mono audio already resampled to [`TARGET_SAMPLE_RATE`].
    pub audio: AudioBuffer,
    /// Scratch directory owned by the caller and removed after the call.
    /// Backends that bridge through files write here and nowhere else.
    pub scratch_dir: &'a Path,
}

/// An external model that denoises speech.
#[async_trait]
pub trait Enhancer: Send + Sync {
    /// Short backend name for logs and `/health`.
    fn name(&self) -> &'static str;

    /// Enhance one buffer. The result is expected at [`TARGET_SAMPLE_RATE`].
    async fn enhance(&self, request: EnhanceRequest<'_>) -> Result<AudioBuffer, EnhanceError>;

    /// Check that the model can currently accept work.
    async fn health(&self) -> Result<(), EnhanceError> {
        Ok(())
    }

    /// Release any resources held by the backend.
    async fn shutdown(&self) {}
}
