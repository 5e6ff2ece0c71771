//! Stage 3: group messages into a batch, call `ProcessBatch`, and apply
//! per-channel relevance/importance thresholds.

use signalbrief_llm::{BatchInput, BatchResult, CompletionRequest, Registry, TaskType, parse_batch_response};

const SYSTEM_PROMPT: &str = "You score and summarize a batch of channel messages. \
Respond with JSON: {\"results\": [{\"index\", \"source_channel\", \"relevance_score\", \
\"importance_score\", \"topic\", \"summary\", \"language\"}]}.";

fn build_prompt(inputs: &[BatchInput]) -> String {
    let mut prompt = String::new();
    for (i, input) in inputs.iter().enumerate() {
        prompt.push_str(&format!("[{i}] channel={}\n{}\n", input.channel_title, input.text));
        if let Some(context) = &input.resolved_link_context {
            prompt.push_str(&format!("linked content: {context}\n"));
        }
        prompt.push('\n');
    }
    prompt
}

/// Run `ProcessBatch` over `inputs`. Empty input short-circuits with no
/// provider call, per the boundary behavior spec.
pub async fn process_batch(
    registry: &Registry,
    inputs: &[BatchInput],
) -> Result<Vec<BatchResult>, signalbrief_llm::GatewayError> {
    if inputs.is_empty() {
        return Ok(Vec::new());
    }

    let request = CompletionRequest::new(SYSTEM_PROMPT, build_prompt(inputs));
    let response = registry.dispatch(TaskType::ProcessBatch, None, &request).await?;
    Ok(parse_batch_response(&response.text, inputs))
}

/// Outcome of applying per-channel thresholds to one batch result.
pub enum ThresholdOutcome {
    Pending,
    Dropped,
}

#[must_use]
pub fn apply_thresholds(
    result: &BatchResult,
    relevance_threshold: f32,
    importance_threshold: f32,
) -> ThresholdOutcome {
    if result.relevance_score < relevance_threshold || result.importance_score < importance_threshold
    {
        ThresholdOutcome::Dropped
    } else {
        ThresholdOutcome::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(relevance: f32, importance: f32) -> BatchResult {
        BatchResult {
            index: 0,
            source_channel: None,
            relevance_score: relevance,
            importance_score: importance,
            topic: "t".into(),
            summary: "s".into(),
            language: "en".into(),
        }
    }

    #[test]
    fn below_relevance_threshold_is_dropped() {
        assert!(matches!(apply_thresholds(&result(0.2, 0.9), 0.5, 0.5), ThresholdOutcome::Dropped));
    }

    #[test]
    fn below_importance_threshold_is_dropped() {
        assert!(matches!(apply_thresholds(&result(0.9, 0.1), 0.5, 0.5), ThresholdOutcome::Dropped));
    }

    #[test]
    fn meeting_both_thresholds_is_pending() {
        assert!(matches!(apply_thresholds(&result(0.6, 0.6), 0.5, 0.5), ThresholdOutcome::Pending));
    }

    #[tokio::test]
    async fn empty_batch_makes_no_provider_call() {
        let store = std::sync::Arc::new(signalbrief_repository_memory::MemoryStateStore::new());
        let lock = std::sync::Arc::new(signalbrief_repository_memory::MemoryDistributedLock::new());
        let budget = std::sync::Arc::new(signalbrief_llm::BudgetTracker::new(1_000_000, None));
        let registry = Registry::new(store, lock, budget);
        let results = process_batch(&registry, &[]).await.unwrap();
        assert!(results.is_empty());
    }
}
