//! Prompt assembly under a size budget.
//!
//! The assembler turns a conversation history into one prompt string that fits
//! the model's effective context limit once the system prompt and the response
//! reserve are taken out. The newest message (the current turn) is always
//! included verbatim; what else fits is decided by the conversation's
//! [`ContextStrategy`]:
//!
//! - **basic**: counts words, keeps the newest messages that fit, drops the rest
//! - **advanced**: counts with the precise measurer, keeps a recent tail verbatim
//!   and folds older messages into chunks that are kept, summarized, or dropped
//!
//! Assembly never fails. Anything that cannot be measured, resolved, or
//! summarized degrades to a smaller prompt.

mod advanced;
mod basic;
mod budget;
mod chunk;

pub use budget::{
    Budget, BudgetTracker, DEFAULT_RESPONSE_RESERVE, MIN_PROMPT_UNITS, WORDS_PER_TOKEN, tokens_to_words,
};
pub use chunk::{Chunk, build_chunks};

use crate::limits::ContextLimitResolver;
use crate::measure::Measurer;
use crate::summarize::Summarizer;
use promptline_common::{ChatSettings, ContextStrategy, Message};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Separator placed between prompt parts.
pub const PART_SEPARATOR: &str = "\n\n";

pub const CONTEXT_HEADER: &str = "Relevant context:";

pub const SUMMARY_HEADER: &str = "[Summary of earlier conversation]";

/// Default context ceiling, in tokens, when a conversation sets none.
pub const DEFAULT_CONTEXT_LIMIT: usize = 8192;

/// Render retrieved context as a prompt part. Blank context yields no part.
pub fn render_context_block(context: &str) -> Option<String> {
    let context = context.trim();
    if context.is_empty() {
        None
    } else {
        Some(format!("{}\n{}", CONTEXT_HEADER, context))
    }
}

pub fn render_summary(summary: &str) -> String {
    format!("{}\n{}", SUMMARY_HEADER, summary.trim())
}

/// Configured limits, in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyLimits {
    /// Used when `ChatSettings::context_limit_units` is unset.
    pub default_context_limit: usize,
    pub response_reserve: usize,
}

impl Default for AssemblyLimits {
    fn default() -> Self {
        Self {
            default_context_limit: DEFAULT_CONTEXT_LIMIT,
            response_reserve: DEFAULT_RESPONSE_RESERVE,
        }
    }
}

/// What an assembly kept and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    pub strategy: ContextStrategy,
    pub context_included: bool,
    /// Earlier messages included word for word outside of chunks.
    pub messages_kept: usize,
    pub messages_dropped: usize,
    pub chunks_verbatim: usize,
    pub chunks_summarized: usize,
    pub chunks_dropped: usize,
    pub used_units: usize,
}

impl fmt::Display for AssemblyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} strategy, {} units used, context {}, {} messages kept, {} dropped",
            self.strategy,
            self.used_units,
            if self.context_included { "included" } else { "omitted" },
            self.messages_kept,
            self.messages_dropped
        )?;
        if self.strategy == ContextStrategy::Advanced {
            write!(
                f,
                ", chunks: {} verbatim / {} summarized / {} dropped",
                self.chunks_verbatim, self.chunks_summarized, self.chunks_dropped
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub prompt: String,
    pub budget: Budget,
    /// Resolved context limit in tokens, suitable for the request's `num_ctx`.
    pub effective_limit: usize,
    pub stats: AssemblyStats,
}

/// Spending state shared by both strategies.
struct Draft<'m> {
    measurer: &'m dyn Measurer,
    tracker: BudgetTracker,
    separator_units: usize,
}

impl<'m> Draft<'m> {
    fn new(measurer: &'m dyn Measurer, budget: &Budget) -> Self {
        Self {
            measurer,
            tracker: BudgetTracker::new(budget.max_prompt_units),
            separator_units: measurer.measure(PART_SEPARATOR),
        }
    }

    fn measure(&self, text: &str) -> usize {
        self.measurer.measure(text)
    }

    fn charge(&mut self, text: &str) {
        let units = self.measure(text) + self.separator_units;
        self.tracker.charge(units);
    }

    fn try_fit(&mut self, text: &str) -> bool {
        let units = self.measure(text);
        self.try_fit_units(units)
    }

    fn try_fit_units(&mut self, units: usize) -> bool {
        self.tracker.try_reserve(units + self.separator_units)
    }

    /// Whether a part of `units` would fit, without reserving it.
    fn has_room_for(&self, units: usize) -> bool {
        units + self.separator_units <= self.tracker.remaining()
    }

    fn used(&self) -> usize {
        self.tracker.used()
    }
}

fn join_parts(context: Option<String>, middle: Vec<String>, current: Option<String>) -> String {
    context
        .into_iter()
        .chain(middle)
        .chain(current)
        .collect::<Vec<_>>()
        .join(PART_SEPARATOR)
}

pub struct PromptAssembler {
    resolver: Arc<ContextLimitResolver>,
    summarizer: Summarizer,
    measurer: Arc<dyn Measurer>,
    limits: AssemblyLimits,
}

impl PromptAssembler {
    /// `measurer` is the precise measurer used by the advanced strategy.
    pub fn new(
        resolver: Arc<ContextLimitResolver>,
        summarizer: Summarizer,
        measurer: Arc<dyn Measurer>,
        limits: AssemblyLimits,
    ) -> Self {
        Self {
            resolver,
            summarizer,
            measurer,
            limits,
        }
    }

    pub fn limits(&self) -> AssemblyLimits {
        self.limits
    }

    pub fn resolver(&self) -> &Arc<ContextLimitResolver> {
        &self.resolver
    }

    pub async fn assemble(
        &self,
        history: &[Message],
        settings: &ChatSettings,
        system_prompt: &str,
        retrieved_context: &str,
    ) -> String {
        self.assemble_with_budget(history, settings, system_prompt, retrieved_context)
            .await
            .prompt
    }

    pub async fn assemble_with_budget(
        &self,
        history: &[Message],
        settings: &ChatSettings,
        system_prompt: &str,
        retrieved_context: &str,
    ) -> AssembledPrompt {
        let user_limit = settings
            .context_limit_units
            .unwrap_or(self.limits.default_context_limit);
        let effective_limit = self.resolver.resolve(&settings.model, user_limit).await;

        let (prompt, budget, stats) = match settings.strategy {
            ContextStrategy::Basic => basic::assemble(
                history,
                system_prompt,
                retrieved_context,
                effective_limit,
                self.limits.response_reserve,
            ),
            ContextStrategy::Advanced => {
                advanced::assemble(
                    advanced::Inputs {
                        history,
                        settings,
                        system_prompt,
                        retrieved_context,
                        effective_limit,
                        response_reserve: self.limits.response_reserve,
                    },
                    self.measurer.as_ref(),
                    &self.summarizer,
                )
                .await
            }
        };

        info!(
            model = %settings.model,
            strategy = %stats.strategy,
            effective_limit,
            max_prompt_units = budget.max_prompt_units,
            used_units = stats.used_units,
            context_included = stats.context_included,
            chunks_summarized = stats.chunks_summarized,
            chunks_dropped = stats.chunks_dropped,
            "assembled prompt"
        );

        AssembledPrompt {
            prompt,
            budget,
            effective_limit,
            stats,
        }
    }
}
