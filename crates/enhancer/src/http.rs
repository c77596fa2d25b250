//! HTTP client for a model served behind a small REST API.
//!
//! The service exposes two endpoints:
//!
//! - `POST {base}/enhance` with an `audio/wav` body (16 kHz mono, 16-bit),
//!   answering with the enhanced audio in the same format.
//! - `GET {base}/health`, any 2xx meaning the model is loaded.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use crate::buffer::{decode_mono_wav, encode_wav, AudioBuffer};
use crate::error::EnhanceError;
use crate::{EnhanceRequest, Enhancer};

const WAV_CONTENT_TYPE: &str = "audio/wav";

/// Enhancer backed by a remote model service.
pub struct HttpEnhancer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEnhancer {
    /// * `base_url` - e.g. `http://127.0.0.1:9000`. A trailing slash is
    ///   tolerated.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Return the response unchanged on 2xx, or an [`EnhanceError::Api`]
    /// carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, EnhanceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EnhanceError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Enhancer for HttpEnhancer {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn enhance(&self, request: EnhanceRequest<'_>) -> Result<AudioBuffer, EnhanceError> {
        let body = encode_wav(&request.audio)?;

        let response = self
            .client
            .post(format!("{}/enhance", self.base_url))
            .header(CONTENT_TYPE, WAV_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(EnhanceError::MalformedOutput(
                "model service returned an empty body".into(),
            ));
        }
        decode_mono_wav(&bytes)
    }

    async fn health(&self) -> Result<(), EnhanceError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let enhancer = HttpEnhancer::new("http://localhost:9000/");
        assert_eq!(enhancer.base_url(), "http://localhost:9000");
    }

    #[tokio::test]
    async fn unreachable_service_is_a_request_error() {
        // Port 9 (discard) is not expected to run an HTTP server.
        let enhancer = HttpEnhancer::new("http://127.0.0.1:9");
        let err = enhancer.health().await.unwrap_err();
        assert!(matches!(err, EnhanceError::Request(_)));
    }
}
