use super::{AssemblyStats, Budget, Draft, join_parts, render_context_block};
use crate::measure::WordMeasurer;
use promptline_common::{ContextStrategy, Message};
use tracing::debug;

/// Word-budget assembly: context if it fits, then the newest messages until
/// the first one that does not fit.
pub(super) fn assemble(
    history: &[Message],
    system_prompt: &str,
    retrieved_context: &str,
    effective_limit: usize,
    response_reserve: usize,
) -> (String, Budget, AssemblyStats) {
    let budget = Budget::in_words(effective_limit, system_prompt, response_reserve);
    let mut draft = Draft::new(&WordMeasurer, &budget);
    let mut stats = AssemblyStats {
        strategy: ContextStrategy::Basic,
        ..Default::default()
    };

    let (current, earlier) = match history.split_last() {
        Some((current, earlier)) => (Some(current.render()), earlier),
        None => (None, history),
    };
    if let Some(text) = &current {
        draft.charge(text);
    }

    let context = render_context_block(retrieved_context).filter(|block| draft.try_fit(block));
    stats.context_included = context.is_some();

    let mut kept = Vec::new();
    for msg in earlier.iter().rev() {
        let text = msg.render();
        if !draft.try_fit(&text) {
            break;
        }
        kept.push(text);
    }
    kept.reverse();

    stats.messages_kept = kept.len();
    stats.messages_dropped = earlier.len() - kept.len();
    stats.used_units = draft.used();
    if stats.messages_dropped > 0 {
        debug!(
            dropped = stats.messages_dropped,
            max_words = budget.max_prompt_units,
            "trimmed older messages"
        );
    }

    (join_parts(context, kept, current), budget, stats)
}
