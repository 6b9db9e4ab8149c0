//! Request and response bodies for the generation endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub options: GenerateOptions,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct GenerateOptions {
    /// Context window the backend should allocate.
    #[serde(rename = "num_ctx", skip_serializing_if = "Option::is_none")]
    pub context_size: Option<usize>,
    pub temperature: f32,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: false,
            system: None,
            options: GenerateOptions::default(),
        }
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = temperature;
        self
    }

    pub fn context_size(mut self, units: usize) -> Self {
        self.options.context_size = Some(units);
        self
    }
}

/// Body of a non-streaming `/api/generate` reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Subset of `POST /api/show` used for context-length discovery.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelDetails {
    /// Modelfile parameters, one `name value` pair per line.
    #[serde(default)]
    pub parameters: Option<String>,
    #[serde(default)]
    pub model_info: Map<String, Value>,
}
