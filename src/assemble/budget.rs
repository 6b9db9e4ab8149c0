//! Prompt budget computation and tracking.

use crate::measure::count_words;

/// Lowest `max_prompt_units` a budget is allowed to reach.
pub const MIN_PROMPT_UNITS: usize = 50;

/// Units held back for the model's reply plus estimator slack.
pub const DEFAULT_RESPONSE_RESERVE: usize = 1024;

/// Conversion used by the basic strategy to express token limits in words.
pub const WORDS_PER_TOKEN: f64 = 0.75;

/// Size budget for one assembly, in the units of the strategy that built it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub effective_limit_units: usize,
    pub system_prompt_units: usize,
    pub response_reserve_units: usize,
    /// `max(MIN_PROMPT_UNITS, effective - system - reserve)`
    pub max_prompt_units: usize,
}

impl Budget {
    pub fn new(effective_limit_units: usize, system_prompt_units: usize, response_reserve_units: usize) -> Self {
        let max_prompt_units = effective_limit_units
            .saturating_sub(system_prompt_units)
            .saturating_sub(response_reserve_units)
            .max(MIN_PROMPT_UNITS);
        Self {
            effective_limit_units,
            system_prompt_units,
            response_reserve_units,
            max_prompt_units,
        }
    }

    /// Budget in words for the basic strategy. Token quantities are converted
    /// at [`WORDS_PER_TOKEN`]; the system prompt is counted in words directly.
    pub fn in_words(effective_limit_tokens: usize, system_prompt: &str, response_reserve_tokens: usize) -> Self {
        Self::new(
            tokens_to_words(effective_limit_tokens),
            count_words(system_prompt),
            tokens_to_words(response_reserve_tokens),
        )
    }
}

pub fn tokens_to_words(tokens: usize) -> usize {
    (tokens as f64 * WORDS_PER_TOKEN).floor() as usize
}

/// Tracks spending against a budget during one assembly.
#[derive(Debug, Clone)]
pub struct BudgetTracker {
    limit: usize,
    used: usize,
}

impl BudgetTracker {
    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    /// Spend `units` if they fit in what is left. Returns whether they were spent.
    pub fn try_reserve(&mut self, units: usize) -> bool {
        if units <= self.remaining() {
            self.used += units;
            true
        } else {
            false
        }
    }

    /// Spend `units` unconditionally. Used for the current turn, which is
    /// always included even when it alone exceeds the budget.
    pub fn charge(&mut self, units: usize) {
        self.used += units;
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.used)
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn usage_percentage(&self) -> f32 {
        if self.limit == 0 {
            return 100.0;
        }
        (self.used as f32 / self.limit as f32) * 100.0
    }

    pub fn status_summary(&self) -> String {
        format!(
            "Prompt: {:.1}% of budget ({} / {} units)",
            self.usage_percentage(),
            self.used,
            self.limit
        )
    }
}
