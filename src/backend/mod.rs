//! Generation backend boundary.
//!
//! The rest of the crate talks to the model server only through two traits:
//! [`Generator`] (used by the summarizer and the dispatcher) and
//! [`ModelMetadataSource`] (used by the context limit resolver). [`OllamaClient`]
//! implements both over HTTP.

mod ollama;
mod wire;

pub use ollama::{DEFAULT_ENDPOINT, OllamaClient};
pub use wire::{GenerateOptions, GenerateRequest, GenerateResponse, ModelDetails};

use crate::errors::BackendError;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Raw response body chunks, in arrival order.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, BackendError>>;

#[async_trait]
pub trait Generator: Send + Sync {
    /// One complete, non-streaming generation.
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, BackendError>;

    /// Start a streaming generation and hand back the live body.
    async fn generate_stream(&self, request: &GenerateRequest) -> Result<ByteStream, BackendError>;

    /// Where requests go, for user-facing messages.
    fn endpoint(&self) -> &str;
}

#[async_trait]
pub trait ModelMetadataSource: Send + Sync {
    /// Model details, or `None` when the backend does not know the model.
    async fn model_details(&self, model: &str) -> Result<Option<ModelDetails>, BackendError>;
}

/// A backend that can both generate and describe models.
pub trait Backend: Generator + ModelMetadataSource {}

impl<T: Generator + ModelMetadataSource> Backend for T {}
