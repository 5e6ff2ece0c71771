//! Tolerant response parsing for the `ProcessBatch` operation.
//!
//! Providers are asked for a fixed shape but chatty models wrap it in
//! prose, wrong-shape containers, or malformed trailing commas — this
//! module absorbs that instead of failing the caller.

use serde_json::Value;
use tracing::warn;

use crate::operation::{BatchInput, BatchResult};

/// Find the widest `{...}`/`[...]` span in `raw` and try to parse it as
/// JSON, first as-is, then with a single trailing-comma removal pass.
fn extract_json_value(raw: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(raw.trim()) {
        return Some(value);
    }

    let candidates = [('{', '}'), ('[', ']')];
    let mut best: Option<&str> = None;

    for (open, close) in candidates {
        if let (Some(start), Some(end)) = (raw.find(open), raw.rfind(close)) {
            if end > start {
                let candidate = &raw[start..=end];
                if best.is_none_or(|b| candidate.len() > b.len()) {
                    best = Some(candidate);
                }
            }
        }
    }

    let candidate = best?;
    if let Ok(value) = serde_json::from_str(candidate) {
        return Some(value);
    }

    let sanitized = sanitize_trailing_commas(candidate);
    serde_json::from_str(&sanitized).ok()
}

fn sanitize_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ',' {
            let mut lookahead = chars.clone();
            while let Some(&next) = lookahead.peek() {
                if next.is_whitespace() {
                    lookahead.next();
                } else {
                    break;
                }
            }
            if matches!(lookahead.peek(), Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Pull the results array out of whatever shape the model returned: the
/// requested `{"results": [...]}` wrapper, a bare array, or an object with
/// an array under some other key.
fn results_array(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(arr) => Some(arr),
        Value::Object(map) => {
            if let Some(Value::Array(arr)) = map.get("results") {
                return Some(arr);
            }
            map.values().find_map(|v| v.as_array())
        }
        _ => None,
    }
}

/// Parse a `ProcessBatch` response, tolerating the documented failure
/// modes. Always returns exactly `inputs.len()` results — entries that
/// can't be recovered are filled with a zero-confidence relevant default
/// so no input silently vanishes from the batch.
pub fn parse_batch_response(raw: &str, inputs: &[BatchInput]) -> Vec<BatchResult> {
    let Some(value) = extract_json_value(raw) else {
        warn!("process_batch response was not recoverable as JSON, returning raw order defaults");
        return default_results(inputs);
    };

    let Some(array) = results_array(&value) else {
        warn!("process_batch response had no results array under any key");
        return default_results(inputs);
    };

    let mut parsed: Vec<BatchResult> = array
        .iter()
        .filter_map(|v| serde_json::from_value::<BatchResult>(v.clone()).ok())
        .collect();

    if parsed.is_empty() {
        return default_results(inputs);
    }

    if parsed.len() > inputs.len() {
        parsed.truncate(inputs.len());
    }

    let indices_usable = {
        let mut seen = vec![false; inputs.len()];
        parsed.iter().all(|r| {
            if r.index == 0 && parsed.iter().filter(|o| o.index == 0).count() > 1 {
                return false;
            }
            r.index < inputs.len() && !std::mem::replace(&mut seen[r.index], true)
        })
    };

    if indices_usable && parsed.len() == inputs.len() {
        let mut by_index = vec![None; inputs.len()];
        for r in parsed {
            let idx = r.index;
            by_index[idx] = Some(r);
        }
        return by_index
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.unwrap_or_else(|| default_result(i)))
            .collect();
    }

    // Indices are duplicated or all-zero: align by echoed source_channel.
    let mut aligned: Vec<Option<BatchResult>> = vec![None; inputs.len()];
    let mut align_count = 0;
    for r in &parsed {
        if let Some(channel) = &r.source_channel {
            if let Some(pos) = inputs
                .iter()
                .position(|input| &input.channel_title == channel)
            {
                if aligned[pos].is_none() {
                    aligned[pos] = Some(r.clone());
                    align_count += 1;
                }
            }
        }
    }

    if align_count * 2 >= inputs.len() {
        return aligned
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.unwrap_or_else(|| default_result(i)))
            .collect();
    }

    warn!(
        aligned = align_count,
        total = inputs.len(),
        "process_batch alignment by source_channel covered fewer than half the inputs, returning raw order"
    );
    let mut raw_order = parsed;
    raw_order.resize_with(inputs.len(), || default_result(0));
    raw_order
}

fn default_result(index: usize) -> BatchResult {
    BatchResult {
        index,
        source_channel: None,
        relevance_score: 0.5,
        importance_score: 0.0,
        topic: String::new(),
        summary: String::new(),
        language: String::new(),
    }
}

fn default_results(inputs: &[BatchInput]) -> Vec<BatchResult> {
    (0..inputs.len()).map(default_result).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(n: usize) -> Vec<BatchInput> {
        (0..n)
            .map(|i| BatchInput {
                channel_title: format!("chan{i}"),
                text: String::new(),
                resolved_link_context: None,
            })
            .collect()
    }

    fn sample_result(index: usize, channel: &str) -> Value {
        serde_json::json!({
            "index": index,
            "source_channel": channel,
            "relevance_score": 0.8,
            "importance_score": 0.3,
            "topic": "topic",
            "summary": "summary",
            "language": "en",
        })
    }

    #[test]
    fn parses_wrapper_shape() {
        let raw = serde_json::json!({"results": [sample_result(0, "chan0")]}).to_string();
        let results = parse_batch_response(&raw, &inputs(1));
        assert_eq!(results[0].topic, "topic");
    }

    #[test]
    fn parses_bare_array() {
        let raw = serde_json::json!([sample_result(0, "chan0")]).to_string();
        let results = parse_batch_response(&raw, &inputs(1));
        assert_eq!(results[0].topic, "topic");
    }

    #[test]
    fn strips_prefix_and_suffix_chatter() {
        let body = serde_json::json!({"results": [sample_result(0, "chan0")]}).to_string();
        let raw = format!("Sure, here is the JSON:\n{body}\nHope that helps!");
        let results = parse_batch_response(&raw, &inputs(1));
        assert_eq!(results[0].topic, "topic");
    }

    #[test]
    fn tolerates_trailing_comma() {
        let raw = r#"{"results": [{"index":0,"source_channel":"chan0","relevance_score":0.5,"importance_score":0.1,"topic":"t","summary":"s","language":"en"},]}"#;
        let results = parse_batch_response(raw, &inputs(1));
        assert_eq!(results[0].topic, "t");
    }

    #[test]
    fn aligns_by_source_channel_when_indices_duplicate() {
        let raw = serde_json::json!({"results": [
            sample_result(0, "chan1"),
            sample_result(0, "chan0"),
        ]})
        .to_string();
        let ins = inputs(2);
        let results = parse_batch_response(&raw, &ins);
        assert_eq!(results[0].topic, "topic");
        assert_eq!(results[1].topic, "topic");
    }

    #[test]
    fn falls_back_to_raw_order_when_alignment_mostly_fails() {
        let raw = serde_json::json!({"results": [
            sample_result(0, "unknown-channel"),
            sample_result(0, "also-unknown"),
        ]})
        .to_string();
        let ins = inputs(4);
        let results = parse_batch_response(&raw, &ins);
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn unrecoverable_garbage_returns_defaults() {
        let results = parse_batch_response("not json at all", &inputs(2));
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].relevance_score, 0.5);
    }
}
