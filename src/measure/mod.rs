//! Text size estimation.
//!
//! Two interchangeable strategies:
//!
//! - [`WordMeasurer`]: whitespace-split word count. Cheap and approximate; it is the
//!   whole measure in basic mode.
//! - [`TokenMeasurer`]: BPE token count. When the tokenizer is unavailable or fails
//!   on an input, the word count scaled by [`WORD_FALLBACK_MULTIPLIER`] is used
//!   instead, so a tokenizer failure never aborts assembly.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Scale applied to word counts standing in for token counts.
/// English averages ~1.3 tokens per word; the extra headroom covers code and punctuation.
pub const WORD_FALLBACK_MULTIPLIER: f64 = 1.5;

/// Estimates the size of a text fragment in abstract units.
pub trait Measurer: Send + Sync {
    fn measure(&self, text: &str) -> usize;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Which measurer backs the advanced strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurerKind {
    #[default]
    Tokenizer,
    Words,
}

impl MeasurerKind {
    pub fn build(self) -> Arc<dyn Measurer> {
        match self {
            MeasurerKind::Tokenizer => Arc::new(TokenMeasurer::new()),
            MeasurerKind::Words => Arc::new(WordMeasurer),
        }
    }
}

impl std::fmt::Display for MeasurerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeasurerKind::Tokenizer => write!(f, "tokenizer"),
            MeasurerKind::Words => write!(f, "words"),
        }
    }
}

/// Counts whitespace-separated words.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordMeasurer;

impl Measurer for WordMeasurer {
    fn measure(&self, text: &str) -> usize {
        count_words(text)
    }

    fn name(&self) -> &'static str {
        "words"
    }
}

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Word count scaled up to stand in for a token count.
pub fn fallback_units(text: &str) -> usize {
    (count_words(text) as f64 * WORD_FALLBACK_MULTIPLIER).ceil() as usize
}

/// A tokenizer that may fail on a given input.
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> anyhow::Result<usize>;
}

/// `cl100k_base` BPE encoding via tiktoken.
pub struct BpeTokenizer {
    bpe: tiktoken_rs::CoreBPE,
}

impl BpeTokenizer {
    pub fn cl100k() -> anyhow::Result<Self> {
        Ok(Self {
            bpe: tiktoken_rs::cl100k_base()?,
        })
    }

    /// Encoding registered for a model name, e.g. `gpt-4o`.
    pub fn for_model(model: &str) -> anyhow::Result<Self> {
        Ok(Self {
            bpe: tiktoken_rs::get_bpe_from_model(model)?,
        })
    }
}

impl Tokenizer for BpeTokenizer {
    fn count_tokens(&self, text: &str) -> anyhow::Result<usize> {
        Ok(self.bpe.encode_ordinary(text).len())
    }
}

/// Loading the BPE ranks is expensive; share one instance per process.
fn shared_bpe() -> Option<Arc<dyn Tokenizer>> {
    static BPE: OnceLock<Option<Arc<dyn Tokenizer>>> = OnceLock::new();
    BPE.get_or_init(|| match BpeTokenizer::cl100k() {
        Ok(tokenizer) => Some(Arc::new(tokenizer) as Arc<dyn Tokenizer>),
        Err(e) => {
            debug!(error = %e, "BPE tokenizer unavailable, using word estimate");
            None
        }
    })
    .clone()
}

/// Token counter with a word-count fallback.
#[derive(Clone)]
pub struct TokenMeasurer {
    tokenizer: Option<Arc<dyn Tokenizer>>,
}

impl TokenMeasurer {
    pub fn new() -> Self {
        Self {
            tokenizer: shared_bpe(),
        }
    }

    pub fn with_tokenizer(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            tokenizer: Some(tokenizer),
        }
    }

    /// A measurer that always uses the scaled word estimate.
    pub fn fallback_only() -> Self {
        Self { tokenizer: None }
    }
}

impl Default for TokenMeasurer {
    fn default() -> Self {
        Self::new()
    }
}

impl Measurer for TokenMeasurer {
    fn measure(&self, text: &str) -> usize {
        let Some(tokenizer) = &self.tokenizer else {
            return fallback_units(text);
        };
        match tokenizer.count_tokens(text) {
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, chars = text.len(), "tokenizer failed, using word estimate");
                fallback_units(text)
            }
        }
    }

    fn name(&self) -> &'static str {
        "tokenizer"
    }
}
