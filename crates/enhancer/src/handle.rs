//! Process-wide handle to the enhancement model.
//!
//! [`EnhancerHandle`] is created once at startup via
//! [`EnhancerHandle::start`] and shared as an `Arc` by every runner
//! invocation. It delegates to the configured backend, tracks whether the
//! model is reachable, and refuses new work after [`EnhancerHandle::shutdown`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::buffer::AudioBuffer;
use crate::config::EnhancerConfig;
use crate::error::EnhanceError;
use crate::{EnhanceRequest, Enhancer};

/// Readiness of the model behind the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleStatus {
    /// Created, readiness not checked yet.
    Starting,
    Ready,
    /// The last health check or call could not reach the model.
    Unavailable,
    Stopped,
}

impl HandleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Unavailable => "unavailable",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for HandleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared owner of the configured [`Enhancer`] backend.
pub struct EnhancerHandle {
    inner: Arc<dyn Enhancer>,
    status: RwLock<HandleStatus>,
}

impl EnhancerHandle {
    /// Build the configured backend and check its health once.
    ///
    /// An unreachable model does not prevent startup; the handle reports
    /// `unavailable` and jobs fail with a model error until it comes back.
    pub async fn start(config: &EnhancerConfig) -> Arc<Self> {
        Self::from_enhancer(config.build()).await
    }

    /// Wrap an already-constructed backend and check its health once.
    pub async fn from_enhancer(inner: Arc<dyn Enhancer>) -> Arc<Self> {
        let handle = Arc::new(Self {
            inner,
            status: RwLock::new(HandleStatus::Starting),
        });
        let status = handle.refresh().await;
        tracing::info!(backend = handle.inner.name(), %status, "Enhancer handle started");
        handle
    }

    /// Last known status, without contacting the backend.
    pub async fn status(&self) -> HandleStatus {
        *self.status.read().await
    }

    /// Check the backend's health and record the result. A stopped handle stays
    /// stopped.
    pub async fn refresh(&self) -> HandleStatus {
        let _ = self.check_health().await;
        self.status().await
    }

    async fn check_health(&self) -> Result<(), EnhanceError> {
        if self.status().await == HandleStatus::Stopped {
            return Err(EnhanceError::Stopped);
        }
        let result = self.inner.health().await;
        let next = match &result {
            Ok(()) => HandleStatus::Ready,
            Err(e) => {
                tracing::warn!(backend = self.inner.name(), error = %e, "Enhancer health check failed");
                HandleStatus::Unavailable
            }
        };
        self.set_unless_stopped(next).await;
        result
    }

    /// Release the backend. Subsequent calls to `enhance` fail with
    /// [`EnhanceError::Stopped`].
    pub async fn shutdown(&self) {
        {
            let mut status = self.status.write().await;
            if *status == HandleStatus::Stopped {
                return;
            }
            *status = HandleStatus::Stopped;
        }
        self.inner.shutdown().await;
        tracing::info!(backend = self.inner.name(), "Enhancer handle shut down");
    }

    async fn set_unless_stopped(&self, next: HandleStatus) -> HandleStatus {
        let mut status = self.status.write().await;
        if *status != HandleStatus::Stopped {
            *status = next;
        }
        *status
    }
}

#[async_trait]
impl Enhancer for EnhancerHandle {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn enhance(&self, request: EnhanceRequest<'_>) -> Result<AudioBuffer, EnhanceError> {
        if self.status().await == HandleStatus::Stopped {
            return Err(EnhanceError::Stopped);
        }
        let result = self.inner.enhance(request).await;
        match &result {
            Ok(_) => {
                self.set_unless_stopped(HandleStatus::Ready).await;
            }
            Err(EnhanceError::Request(_)) => {
                self.set_unless_stopped(HandleStatus::Unavailable).await;
            }
            Err(_) => {}
        }
        result
    }

    async fn health(&self) -> Result<(), EnhanceError> {
        self.check_health().await
    }

    async fn shutdown(&self) {
        EnhancerHandle::shutdown(self).await;
    }
}
