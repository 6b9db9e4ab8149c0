pub mod assemble;
pub mod backend;
pub mod config;
pub mod context;
pub mod errors;
pub mod limits;
pub mod measure;
pub mod pipeline;
pub mod stream;
pub mod summarize;
pub mod ui;

pub use promptline_common::{
    ChatSettings, ContextStrategy, Message, Role, StreamEvent, TimingMetadata, ToolCall,
};
