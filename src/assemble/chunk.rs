//! Grouping of older messages into summarization chunks.

use super::PART_SEPARATOR;
use crate::measure::Measurer;
use promptline_common::Message;

/// A contiguous run of older messages, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub messages: Vec<Message>,
    /// Rendered messages joined by blank lines.
    pub concatenated_text: String,
    pub size_units: usize,
}

impl Chunk {
    pub fn from_messages(messages: Vec<Message>, measurer: &dyn Measurer) -> Self {
        let concatenated_text = messages
            .iter()
            .map(Message::render)
            .collect::<Vec<_>>()
            .join(PART_SEPARATOR);
        let size_units = measurer.measure(&concatenated_text);
        Self {
            messages,
            concatenated_text,
            size_units,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Split `messages` into chunks of at most `chunk_size_units`.
///
/// Messages are taken oldest first; a chunk is closed when adding the next
/// message (and the separator before it) would exceed the size. A message
/// larger than the size on its own becomes a single-message chunk.
pub fn build_chunks(messages: &[Message], chunk_size_units: usize, measurer: &dyn Measurer) -> Vec<Chunk> {
    let chunk_size_units = chunk_size_units.max(1);
    let separator_units = measurer.measure(PART_SEPARATOR);
    let mut chunks = Vec::new();
    let mut current: Vec<Message> = Vec::new();
    let mut current_units = 0usize;

    for msg in messages {
        let units = measurer.measure(&msg.render());
        if !current.is_empty() {
            if current_units + separator_units + units > chunk_size_units {
                chunks.push(Chunk::from_messages(std::mem::take(&mut current), measurer));
                current_units = 0;
            } else {
                current_units += separator_units;
            }
        }
        current.push(msg.clone());
        current_units += units;
    }

    if !current.is_empty() {
        chunks.push(Chunk::from_messages(current, measurer));
    }
    chunks
}
