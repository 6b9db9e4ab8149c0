use super::{AssemblyStats, Budget, Draft, build_chunks, join_parts, render_context_block, render_summary};
use crate::measure::Measurer;
use crate::summarize::Summarizer;
use promptline_common::{ChatSettings, ContextStrategy, Message};
use tracing::debug;

pub(super) struct Inputs<'a> {
    pub history: &'a [Message],
    pub settings: &'a ChatSettings,
    pub system_prompt: &'a str,
    pub retrieved_context: &'a str,
    pub effective_limit: usize,
    pub response_reserve: usize,
}

/// Unit-accurate assembly with a verbatim recent tail and chunked older history.
///
/// Spending order: current turn, context block, recent tail (newest first),
/// then chunks oldest first. Output order: context, chunks, tail, current turn.
pub(super) async fn assemble(
    inputs: Inputs<'_>,
    measurer: &dyn Measurer,
    summarizer: &Summarizer,
) -> (String, Budget, AssemblyStats) {
    let Inputs {
        history,
        settings,
        system_prompt,
        retrieved_context,
        effective_limit,
        response_reserve,
    } = inputs;

    let budget = Budget::new(effective_limit, measurer.measure(system_prompt), response_reserve);
    let mut draft = Draft::new(measurer, &budget);
    let mut stats = AssemblyStats {
        strategy: ContextStrategy::Advanced,
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

    let mut tail_start = earlier.len();
    for (idx, msg) in earlier.iter().enumerate().rev().take(settings.keep_last_n) {
        if !draft.try_fit(&msg.render()) {
            break;
        }
        tail_start = idx;
    }
    let tail: Vec<String> = earlier[tail_start..].iter().map(Message::render).collect();
    stats.messages_kept = tail.len();

    // Smallest possible summary part: the header alone.
    let summary_floor_units = draft.measure(&render_summary(""));

    let mut parts = Vec::new();
    for chunk in build_chunks(&earlier[..tail_start], settings.chunk_size_units, measurer) {
        if draft.try_fit_units(chunk.size_units) {
            stats.chunks_verbatim += 1;
            parts.push(chunk.concatenated_text);
            continue;
        }

        if summarizer.is_active(settings)
            && draft.has_room_for(summary_floor_units)
            && let Some(summary) = summarizer.summarize(&chunk, settings).await
        {
            let part = render_summary(&summary);
            if draft.try_fit(&part) {
                stats.chunks_summarized += 1;
                parts.push(part);
                continue;
            }
            debug!(chunk_units = chunk.size_units, "summary does not fit, dropping chunk");
        } else {
            debug!(chunk_units = chunk.size_units, "chunk does not fit, dropping");
        }
        stats.chunks_dropped += 1;
        stats.messages_dropped += chunk.messages.len();
    }

    parts.extend(tail);
    stats.used_units = draft.used();

    (join_parts(context, parts, current), budget, stats)
}
