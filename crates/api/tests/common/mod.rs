#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sqlx::SqlitePool;
use tower::ServiceExt;

use clearwave_api::config::ServerConfig;
use clearwave_api::router::build_app_router;
use clearwave_api::state::AppState;
use clearwave_core::upload::DEFAULT_MAX_UPLOAD_BYTES;
use clearwave_enhancer::config::{EnhancerBackend, DEFAULT_ENHANCER_URL};
use clearwave_enhancer::{
    AudioBuffer, EnhanceError, EnhanceRequest, Enhancer, EnhancerConfig, EnhancerHandle,
};
use clearwave_pipeline::{EnhancementRunner, RunnerSettings};
use clearwave_worker::{DispatcherConfig, TaskDispatcher};

const BOUNDARY: &str = "clearwave-test-boundary";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:8000".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        database_url: "sqlite::memory:".to_string(),
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        worker_concurrency: 2,
        queue_capacity: 16,
        enhance_timeout_secs: 5,
        enhancer: EnhancerConfig {
            backend: EnhancerBackend::Http {
                base_url: DEFAULT_ENHANCER_URL.to_string(),
            },
        },
    }
}

// ---------------------------------------------------------------------------
// Model doubles
// ---------------------------------------------------------------------------

/// Returns its input unchanged.
pub struct EchoModel;

#[async_trait]
impl Enhancer for EchoModel {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn enhance(&self, request: EnhanceRequest<'_>) -> Result<AudioBuffer, EnhanceError> {
        Ok(request.audio)
    }
}

/// Always fails with a fixed message.
pub struct FailingModel(pub &'static str);

#[async_trait]
impl Enhancer for FailingModel {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn enhance(&self, _request: EnhanceRequest<'_>) -> Result<AudioBuffer, EnhanceError> {
        Err(EnhanceError::Process(self.0.to_string()))
    }

    async fn health(&self) -> Result<(), EnhanceError> {
        Err(EnhanceError::Process(self.0.to_string()))
    }
}

/// Holds every call open for far longer than any test runs.
pub struct StuckModel;

#[async_trait]
impl Enhancer for StuckModel {
    fn name(&self) -> &'static str {
        "stuck"
    }

    async fn enhance(&self, _request: EnhanceRequest<'_>) -> Result<AudioBuffer, EnhanceError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Err(EnhanceError::Process("still stuck".into()))
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Full application router backed by `pool` and an echoing model.
pub async fn build_test_app(pool: SqlitePool) -> Router {
    build_test_app_with(pool, Arc::new(EchoModel)).await
}

/// Full application router with the given model, using the production
/// middleware stack, runner and dispatcher.
pub async fn build_test_app_with(pool: SqlitePool, model: Arc<dyn Enhancer>) -> Router {
    build_test_app_configured(pool, model, test_config()).await
}

/// Like [`build_test_app_with`], with a caller-supplied config.
pub async fn build_test_app_configured(
    pool: SqlitePool,
    model: Arc<dyn Enhancer>,
    config: ServerConfig,
) -> Router {
    let enhancer = EnhancerHandle::from_enhancer(model).await;
    let runner = EnhancementRunner::new(
        pool.clone(),
        Arc::clone(&enhancer) as Arc<dyn Enhancer>,
        RunnerSettings {
            timeout: config.enhance_timeout(),
            ..RunnerSettings::default()
        },
    );
    let dispatcher = TaskDispatcher::start(
        Arc::new(runner),
        DispatcherConfig {
            workers: config.worker_concurrency,
            queue_capacity: config.queue_capacity,
        },
    );

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        dispatcher,
        enhancer,
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn delete(app: Router, uri: &str) -> Response {
    send(
        app,
        Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

/// POST a multipart form with a single file part.
pub async fn upload(app: Router, field: &str, filename: &str, bytes: &[u8]) -> Response {
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: audio/wav\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::post("/api/v1/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Upload `bytes` as `filename` and return the new job id.
pub async fn upload_ok(app: &Router, filename: &str, bytes: &[u8]) -> String {
    let response = upload(app.clone(), "file", filename, bytes).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    json["data"]["id"].as_str().unwrap().to_string()
}

/// Poll `/status/{id}` until the job is `enhanced` or `error`.
pub async fn wait_for_terminal(app: &Router, id: &str) -> serde_json::Value {
    wait_for_status(app, id, &["enhanced", "error"]).await
}

/// Poll `/status/{id}` until the job reaches one of `wanted`.
pub async fn wait_for_status(app: &Router, id: &str, wanted: &[&str]) -> serde_json::Value {
    let uri = format!("/api/v1/status/{id}");
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let json = body_json(get(app.clone(), &uri).await).await;
            let status = json["data"]["status"].as_str().unwrap_or_default();
            if wanted.contains(&status) {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("job {id} never reached {wanted:?}"))
}

// ---------------------------------------------------------------------------
// Audio fixtures
// ---------------------------------------------------------------------------

/// A short 16-bit WAV with `channels` at `sample_rate`.
pub fn wav_fixture(channels: u16, sample_rate: u32, frames: usize) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames * usize::from(channels) {
            writer.write_sample(((i % 200) as i16 - 100) * 50).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
