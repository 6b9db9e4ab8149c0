use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool invocation requested by the model. Never executed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    /// Arguments as JSON text, exactly as the model produced them.
    pub arguments_json: String,
}

/// Completion metadata reported on the final record of a generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    /// Nanoseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_duration: Option<u64>,
}

impl TimingMetadata {
    /// Generation speed in tokens per second, when the counters allow it.
    pub fn tokens_per_second(&self) -> Option<f64> {
        match (self.eval_count, self.eval_duration) {
            (Some(count), Some(ns)) if ns > 0 => Some(count as f64 / (ns as f64 / 1e9)),
            _ => None,
        }
    }
}

/// Events decoded from a generation stream.
///
/// Exactly one terminal event ends a stream: `Done`, or an `Error`.
/// `Content` and `ToolCalls` may repeat before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Content {
        text: String,
        is_final: bool,
    },
    ToolCalls {
        calls: Vec<ToolCall>,
        raw_assistant_message: Value,
    },
    Done {
        model: Option<String>,
        timing: TimingMetadata,
    },
    Error {
        message: String,
        is_fatal: bool,
    },
}

impl StreamEvent {
    pub fn content(text: impl Into<String>, is_final: bool) -> Self {
        StreamEvent::Content {
            text: text.into(),
            is_final,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
            is_fatal: true,
        }
    }

    pub fn non_fatal(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
            is_fatal: false,
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}
