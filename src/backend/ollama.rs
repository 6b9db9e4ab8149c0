use super::wire::{GenerateRequest, GenerateResponse, ModelDetails};
use super::{ByteStream, Generator, ModelMetadataSource};
use crate::errors::BackendError;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// HTTP client for an Ollama-compatible server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        Self::with_timeouts(base_url, Duration::from_secs(5), Duration::from_secs(300))
    }

    /// `request_timeout` bounds the time to response headers; streamed bodies
    /// are read without a deadline.
    pub fn with_timeouts(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(request_timeout)
            .build()
            .map_err(BackendError::Transport)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, BackendError> {
        let url = self.url(path);
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(&self.base_url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                endpoint: url,
                status: status.as_u16(),
                body: error_text(&body),
            });
        }
        Ok(resp)
    }
}

/// Pull `{"error": "..."}` out of an error body when present.
fn error_text(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl Generator for OllamaClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, BackendError> {
        let mut request = request.clone();
        request.stream = false;
        debug!(model = %request.model, prompt_chars = request.prompt.len(), "generate");

        let resp = self.post_json("/api/generate", &request).await?;
        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(BackendError::Decode(err));
        }
        Ok(parsed)
    }

    async fn generate_stream(&self, request: &GenerateRequest) -> Result<ByteStream, BackendError> {
        let mut request = request.clone();
        request.stream = true;
        debug!(model = %request.model, prompt_chars = request.prompt.len(), "generate (stream)");

        let resp = self.post_json("/api/generate", &request).await?;
        let endpoint = self.base_url.clone();
        let body = resp.bytes_stream().map(move |chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| BackendError::from_reqwest(&endpoint, e))
        });
        Ok(body.boxed())
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ModelMetadataSource for OllamaClient {
    async fn model_details(&self, model: &str) -> Result<Option<ModelDetails>, BackendError> {
        match self.post_json("/api/show", &json!({ "model": model })).await {
            Ok(resp) => resp
                .json::<ModelDetails>()
                .await
                .map(Some)
                .map_err(|e| BackendError::Decode(e.to_string())),
            Err(BackendError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
