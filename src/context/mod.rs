//! Retrieved context and system prompt sources.
//!
//! A [`ContextProvider`] supplies text relevant to the latest user message.
//! [`ContextContentCache`] memoizes the provider result for the most recent
//! query and role file contents per path, so retries and regenerations of
//! the same turn do not repeat that work.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer accurately and concisely, and say so when you are unsure.";

/// Supplies retrieved context for a request.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Context relevant to `latest_user_text`, or an empty string.
    async fn prepare_context(&self, latest_user_text: &str) -> String;
}

/// The same text for every request.
#[derive(Debug, Clone, Default)]
pub struct StaticContext {
    text: String,
}

impl StaticContext {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read context file: {}", path.display()))?;
        Ok(Self::new(text))
    }
}

#[async_trait]
impl ContextProvider for StaticContext {
    async fn prepare_context(&self, _latest_user_text: &str) -> String {
        self.text.clone()
    }
}

/// Cached retrieved context and role text.
#[derive(Debug, Default)]
pub struct ContextContentCache {
    context_by_query: DashMap<String, String>,
    role_text_by_path: DashMap<PathBuf, String>,
}

impl ContextContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for `query`, asking `provider` only on a miss.
    ///
    /// Only the latest query is kept: each new turn replaces the entry.
    pub async fn context_for(&self, provider: &dyn ContextProvider, query: &str) -> String {
        if let Some(hit) = self.context_by_query.get(query) {
            debug!(query_len = query.len(), "retrieved context cache hit");
            return hit.value().clone();
        }
        let text = provider.prepare_context(query).await;
        self.context_by_query.clear();
        self.context_by_query.insert(query.to_string(), text.clone());
        text
    }

    /// Contents of a role file. Read failures are logged and not cached, so a
    /// file created later is picked up.
    pub fn role_text(&self, path: &Path) -> Option<String> {
        if let Some(hit) = self.role_text_by_path.get(path) {
            return Some(hit.value().clone());
        }
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let text = text.trim().to_string();
                self.role_text_by_path.insert(path.to_path_buf(), text.clone());
                Some(text)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read role file");
                None
            }
        }
    }

    pub fn clear(&self) {
        self.context_by_query.clear();
        self.role_text_by_path.clear();
    }

    pub fn len(&self) -> usize {
        self.context_by_query.len() + self.role_text_by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the system prompt: explicit override, else role text, else the
/// built-in default. With `now`, a current date line is appended.
pub fn compose_system_prompt(
    override_text: Option<&str>,
    role_text: Option<&str>,
    now: Option<DateTime<Local>>,
) -> String {
    let base = [override_text, role_text]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    match now {
        Some(now) => format!(
            "{}\n\nCurrent date and time: {}",
            base,
            now.format("%A, %B %-d, %Y %H:%M")
        ),
        None => base.to_string(),
    }
}
