//! Typed error hierarchy for promptline.
//!
//! Two top-level enums cover the two failure surfaces:
//! - `BackendError` — transport and protocol failures talking to the generation endpoint
//! - `PipelineError` — caller-facing setup failures plus backend failures on the
//!   non-streaming path
//!
//! Streaming failures never appear here; they surface as `StreamEvent::Error`.

use thiserror::Error;

/// Errors from the HTTP generation backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error(
        "Could not connect to the generation backend at {endpoint}. \
         Is the server running and reachable?"
    )]
    Unreachable {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Backend at {endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response from backend: {0}")]
    Decode(String),

    #[error("Backend request failed: {0}")]
    Transport(#[source] reqwest::Error),
}

impl BackendError {
    /// Classify a reqwest error, folding connect failures and timeouts into
    /// the single user-facing `Unreachable` message.
    pub fn from_reqwest(endpoint: &str, err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            BackendError::Unreachable {
                endpoint: endpoint.to_string(),
                source: err,
            }
        } else if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err)
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, BackendError::Unreachable { .. })
    }
}

/// Errors reported to callers of the chat pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No generation backend is configured")]
    NoBackend,

    #[error("No model selected. Set defaults.model in promptline.toml or pass --model")]
    MissingModel,

    #[error("Conversation history is empty; nothing to send")]
    EmptyHistory,

    #[error(transparent)]
    Backend(#[from] BackendError),
}
