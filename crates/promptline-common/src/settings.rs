use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How history is fitted into the context budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextStrategy {
    /// Word-count budget, newest-first greedy trimming, no summarization.
    Basic,
    /// Unit-accurate budget with a protected recent tail and chunk summarization.
    #[default]
    Advanced,
}

impl std::fmt::Display for ContextStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextStrategy::Basic => write!(f, "basic"),
            ContextStrategy::Advanced => write!(f, "advanced"),
        }
    }
}

#[derive(Debug, Error)]
#[error("Invalid context strategy '{0}'. Valid values: basic, advanced")]
pub struct ParseStrategyError(pub String);

impl std::str::FromStr for ContextStrategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(ContextStrategy::Basic),
            "advanced" => Ok(ContextStrategy::Advanced),
            _ => Err(ParseStrategyError(s.to_string())),
        }
    }
}

/// Per-conversation overrides. Read-only input to prompt assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f32,
    #[serde(default)]
    pub strategy: ContextStrategy,
    #[serde(default = "default_summarization_enabled")]
    pub summarization_enabled: bool,
    #[serde(default = "default_keep_last_n")]
    pub keep_last_n: usize,
    #[serde(default = "default_chunk_size_units")]
    pub chunk_size_units: usize,
    /// User-configured ceiling; the assembler's default applies when unset.
    #[serde(default)]
    pub context_limit_units: Option<usize>,
    /// Replaces the configured role text for this conversation.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_summarization_enabled() -> bool {
    true
}

fn default_keep_last_n() -> usize {
    6
}

fn default_chunk_size_units() -> usize {
    1000
}

impl ChatSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.7,
            strategy: ContextStrategy::default(),
            summarization_enabled: default_summarization_enabled(),
            keep_last_n: default_keep_last_n(),
            chunk_size_units: default_chunk_size_units(),
            context_limit_units: None,
            system_prompt: None,
        }
    }

    pub fn with_strategy(mut self, strategy: ContextStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_context_limit(mut self, units: usize) -> Self {
        self.context_limit_units = Some(units);
        self
    }
}
