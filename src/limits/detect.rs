//! Context-length discovery from model metadata.

use crate::backend::ModelDetails;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn num_ctx_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*num_ctx\s+(\d+)\s*$").expect("static regex is valid"))
}

/// Find the model's context length in its metadata.
///
/// Checked in priority order:
/// 1. `num_ctx` in the Modelfile parameter string
/// 2. `model_info["<general.architecture>.context_length"]`
/// 3. `model_info["context_length"]`, then any other `*.context_length` key
///
/// Returns the first value that parses to a positive integer.
pub fn detect_context_length(details: &ModelDetails) -> Option<usize> {
    if let Some(n) = details.parameters.as_deref().and_then(parse_num_ctx) {
        return Some(n);
    }

    let info = &details.model_info;

    if let Some(arch) = info.get("general.architecture").and_then(Value::as_str)
        && let Some(n) = info
            .get(&format!("{}.context_length", arch))
            .and_then(parse_positive)
    {
        return Some(n);
    }

    if let Some(n) = info.get("context_length").and_then(parse_positive) {
        return Some(n);
    }

    let mut keys: Vec<&String> = info
        .keys()
        .filter(|k| k.ends_with(".context_length"))
        .collect();
    // Map iteration order is not stable across serde_json features.
    keys.sort();
    keys.into_iter().find_map(|k| info.get(k).and_then(parse_positive))
}

/// Extract `num_ctx` from a Modelfile parameter block.
pub fn parse_num_ctx(parameters: &str) -> Option<usize> {
    num_ctx_pattern()
        .captures(parameters)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<usize>().ok())
        .filter(|n| *n > 0)
}

/// Accept JSON numbers and numeric strings.
fn parse_positive(value: &Value) -> Option<usize> {
    let n = match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }?;
    (n > 0).then_some(n)
}
