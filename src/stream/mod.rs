//! Decoding of newline-delimited JSON generation streams.
//!
//! A generation response body is a sequence of JSON records, one per line,
//! delivered in arbitrarily split byte chunks. [`LineDecoder`] turns pushed
//! bytes into [`StreamEvent`]s synchronously; [`StreamDecoder`] drives it from
//! a live byte stream with cancellation.

mod decoder;
mod lines;
mod utf8;

pub use decoder::{EVENT_CHANNEL_CAPACITY, StreamDecoder};
pub use lines::LineDecoder;
pub use utf8::Utf8Decoder;

use promptline_common::{StreamEvent, TimingMetadata, ToolCall};
use serde::Deserialize;
use serde_json::Value;

pub const CANCELLED_MESSAGE: &str = "Generation stopped by user";

pub const TRUNCATED_MESSAGE: &str = "Stream ended before the model signalled completion";

/// One line of a generation response.
///
/// Completion-style records carry `response`; chat-style records carry
/// `message.content` and possibly `message.tool_calls`.
#[derive(Debug, Default, Deserialize)]
pub struct ResponseRecord {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    /// Kept raw so tool-call turns can be echoed back unchanged.
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(flatten)]
    pub timing: TimingMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
pub struct WireToolCall {
    pub function: WireFunction,
}

#[derive(Debug, Deserialize)]
pub struct WireFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl WireToolCall {
    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall {
            name: self.function.name.clone(),
            arguments_json: arguments_text(&self.function.arguments),
        }
    }
}

/// Arguments as JSON text. Strings are taken as already-encoded JSON.
fn arguments_text(arguments: &Value) -> String {
    match arguments {
        Value::String(s) => s.clone(),
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    }
}

fn error_text(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ResponseRecord {
    pub fn chat_message(&self) -> Option<ChatMessage> {
        self.message
            .as_ref()
            .and_then(|m| serde_json::from_value(m.clone()).ok())
    }

    /// Events for this record, in emission order, and whether the record ends
    /// the stream.
    pub fn into_events(self) -> (Vec<StreamEvent>, bool) {
        if let Some(error) = &self.error {
            return (vec![StreamEvent::fatal(error_text(error))], true);
        }

        let mut events = Vec::new();
        let chat = self.chat_message();

        if let Some(chat) = &chat
            && !chat.tool_calls.is_empty()
        {
            events.push(StreamEvent::ToolCalls {
                calls: chat.tool_calls.iter().map(WireToolCall::to_tool_call).collect(),
                raw_assistant_message: self.message.clone().unwrap_or(Value::Null),
            });
        }

        if let Some(text) = self.response.or_else(|| chat.and_then(|c| c.content)) {
            events.push(StreamEvent::content(text, self.done));
        }

        if self.done {
            events.push(StreamEvent::Done {
                model: self.model,
                timing: self.timing,
            });
        }

        (events, self.done)
    }
}
