//! Integration tests for the process-wide enhancer handle.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use clearwave_enhancer::{
    AudioBuffer, EnhanceError, EnhanceRequest, Enhancer, EnhancerHandle, HandleStatus,
    TARGET_SAMPLE_RATE,
};

/// Echoes its input; health toggles with `healthy`.
#[derive(Default)]
struct EchoModel {
    healthy: AtomicBool,
    calls: AtomicUsize,
    shutdowns: AtomicUsize,
}

#[async_trait]
impl Enhancer for EchoModel {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn enhance(&self, request: EnhanceRequest<'_>) -> Result<AudioBuffer, EnhanceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(request.audio)
    }

    async fn health(&self) -> Result<(), EnhanceError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(EnhanceError::Process("model not loaded".into()))
        }
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

fn audio() -> AudioBuffer {
    AudioBuffer::new(vec![0.0, 0.5, -0.5], TARGET_SAMPLE_RATE)
}

#[tokio::test]
async fn start_checks_readiness_once() {
    let model = Arc::new(EchoModel::default());
    model.healthy.store(true, Ordering::SeqCst);

    let handle = EnhancerHandle::from_enhancer(model.clone()).await;
    assert_eq!(handle.status().await, HandleStatus::Ready);
    assert_eq!(handle.name(), "echo");
}

#[tokio::test]
async fn unhealthy_model_is_reported_and_recovers_on_refresh() {
    let model = Arc::new(EchoModel::default());
    let handle = EnhancerHandle::from_enhancer(model.clone()).await;
    assert_eq!(handle.status().await, HandleStatus::Unavailable);

    model.healthy.store(true, Ordering::SeqCst);
    assert_eq!(handle.refresh().await, HandleStatus::Ready);
}

#[tokio::test]
async fn delegates_enhance_calls() {
    let model = Arc::new(EchoModel::default());
    let handle = EnhancerHandle::from_enhancer(model.clone()).await;
    let scratch = tempfile::tempdir().unwrap();

    let out = handle
        .enhance(EnhanceRequest {
            audio: audio(),
            scratch_dir: scratch.path(),
        })
        .await
        .unwrap();
    assert_eq!(out, audio());
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    // A successful call proves the model is usable.
    assert_eq!(handle.status().await, HandleStatus::Ready);
}

#[tokio::test]
async fn shutdown_is_explicit_and_final() {
    let model = Arc::new(EchoModel::default());
    model.healthy.store(true, Ordering::SeqCst);
    let handle = EnhancerHandle::from_enhancer(model.clone()).await;

    handle.shutdown().await;
    handle.shutdown().await;
    assert_eq!(model.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(handle.status().await, HandleStatus::Stopped);
    assert_eq!(handle.refresh().await, HandleStatus::Stopped);

    let scratch = tempfile::tempdir().unwrap();
    let err = handle
        .enhance(EnhanceRequest {
            audio: audio(),
            scratch_dir: scratch.path(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, EnhanceError::Stopped);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn status_strings_are_lowercase() {
    assert_eq!(HandleStatus::Starting.as_str(), "starting");
    assert_eq!(HandleStatus::Unavailable.to_string(), "unavailable");
}
