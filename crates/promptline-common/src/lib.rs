//! Shared domain types for promptline.
//!
//! These types cross the boundary between the prompt assembler, the stream
//! decoder, and whatever surface renders a conversation:
//!
//! - [`Message`] / [`Role`]: one immutable conversation turn
//! - [`ChatSettings`] / [`ContextStrategy`]: per-conversation overrides
//! - [`StreamEvent`]: the typed events decoded from a generation stream

mod event;
mod message;
mod settings;

pub use event::{StreamEvent, TimingMetadata, ToolCall};
pub use message::{Message, Role};
pub use settings::{ChatSettings, ContextStrategy, ParseStrategyError};
