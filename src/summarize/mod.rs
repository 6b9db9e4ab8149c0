//! Chunk summarization.
//!
//! Condenses a run of older messages into a short synthetic message with one
//! non-streaming generation call. Every failure maps to `None`; the assembler
//! then drops the chunk.

use crate::assemble::Chunk;
use crate::backend::{GenerateRequest, Generator};
use promptline_common::ChatSettings;
use std::sync::Arc;
use tracing::{debug, warn};

/// Placeholder replaced by the chunk text.
pub const CONVERSATION_PLACEHOLDER: &str = "{conversation}";

pub const DEFAULT_SUMMARY_TEMPERATURE: f32 = 0.2;

pub const DEFAULT_SUMMARY_TEMPLATE: &str = "Summarize the following part of a conversation in a few \
sentences. Keep names, facts, decisions, and open questions. Do not add anything that is not in \
the text.\n\n{conversation}\n\nSummary:";

/// Summarizer settings, independent of the conversation's own settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOptions {
    pub enabled: bool,
    pub temperature: f32,
    pub template: String,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            temperature: DEFAULT_SUMMARY_TEMPERATURE,
            template: DEFAULT_SUMMARY_TEMPLATE.to_string(),
        }
    }
}

pub struct Summarizer {
    generator: Option<Arc<dyn Generator>>,
    options: SummaryOptions,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn Generator>, options: SummaryOptions) -> Self {
        Self {
            generator: Some(generator),
            options,
        }
    }

    /// A summarizer that never summarizes.
    pub fn disabled() -> Self {
        Self {
            generator: None,
            options: SummaryOptions {
                enabled: false,
                ..SummaryOptions::default()
            },
        }
    }

    pub fn options(&self) -> &SummaryOptions {
        &self.options
    }

    /// Whether a call would be attempted for this conversation.
    pub fn is_active(&self, settings: &ChatSettings) -> bool {
        self.options.enabled && settings.summarization_enabled && self.generator.is_some()
    }

    /// Render the instruction prompt for a chunk.
    pub fn build_prompt(&self, chunk_text: &str) -> String {
        if self.options.template.contains(CONVERSATION_PLACEHOLDER) {
            self.options
                .template
                .replace(CONVERSATION_PLACEHOLDER, chunk_text)
        } else {
            format!("{}\n\n{}", self.options.template.trim_end(), chunk_text)
        }
    }

    pub async fn summarize(&self, chunk: &Chunk, settings: &ChatSettings) -> Option<String> {
        if !self.is_active(settings) || chunk.is_empty() {
            return None;
        }
        let generator = self.generator.as_ref()?;

        let request = GenerateRequest::new(&settings.model, self.build_prompt(&chunk.concatenated_text))
            .temperature(self.options.temperature);

        match generator.generate(&request).await {
            Ok(resp) => {
                let summary = resp.response.trim();
                if summary.is_empty() {
                    warn!(model = %settings.model, "summarization returned empty output");
                    None
                } else {
                    debug!(
                        messages = chunk.messages.len(),
                        chunk_units = chunk.size_units,
                        summary_chars = summary.len(),
                        "summarized chunk"
                    );
                    Some(summary.to_string())
                }
            }
            Err(e) => {
                warn!(model = %settings.model, error = %e, "summarization failed, chunk will be dropped");
                None
            }
        }
    }
}
