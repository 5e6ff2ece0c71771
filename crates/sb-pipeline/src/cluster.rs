//! Stage 7: the periodic clustering sweep. Unlike stages 1-6 this does not
//! run per-message — it's a separate job, driven by the worker fabric's
//! ticker, over a lookback window of already-ready items.

use signalbrief_core::{ClusterSummary, Item, ItemId};
use signalbrief_llm::{CompletionRequest, GatewayError, Registry, TaskType};
use signalbrief_repository::ClusterRepository;

use crate::config::ClusterConfig;

/// Cosine similarity between two embeddings. `0.0` on length mismatch or
/// either vector having zero magnitude, same convention as dedup.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0_f32;
    let mut mag_a = 0.0_f32;
    let mut mag_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }
    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}

/// Group `items` into connected components where an edge exists between
/// any pair whose embeddings exceed `threshold` similarity. Items with no
/// embedding never join a component.
fn connected_components(items: &[Item], threshold: f32) -> Vec<Vec<usize>> {
    let n = items.len();
    let mut visited = vec![false; n];
    let mut components = Vec::new();

    for start in 0..n {
        if visited[start] || items[start].embedding.is_none() {
            continue;
        }
        let mut stack = vec![start];
        let mut component = Vec::new();
        visited[start] = true;
        while let Some(i) = stack.pop() {
            component.push(i);
            let Some(ei) = &items[i].embedding else { continue };
            for j in 0..n {
                if visited[j] {
                    continue;
                }
                let Some(ej) = &items[j].embedding else { continue };
                if cosine_similarity(ei, ej) >= threshold {
                    visited[j] = true;
                    stack.push(j);
                }
            }
        }
        if component.len() > 1 {
            components.push(component);
        }
    }
    components
}

const TOPIC_PROMPT: &str = "Give a short (under 8 word) topic label for this set of messages.";
const SUMMARY_PROMPT: &str = "Write a neutral summary, at most 240 characters of minimal HTML, \
covering this set of related messages.";

fn build_cluster_text(items: &[&Item]) -> String {
    items.iter().map(|item| item.summary.as_str()).collect::<Vec<_>>().join("\n")
}

/// Run one clustering sweep over `items` (already filtered to the
/// configured lookback window by the caller), writing a [`ClusterSummary`]
/// per discovered component.
pub async fn run_cluster_sweep(
    registry: &Registry,
    clusters: &dyn ClusterRepository,
    items: &[Item],
    config: &ClusterConfig,
) -> Result<usize, GatewayError> {
    let components = connected_components(items, config.similarity_threshold);
    let mut written = 0;

    for component in components.into_iter().take(config.max_candidates) {
        let member_items: Vec<&Item> = component.iter().map(|&i| &items[i]).collect();
        let text = build_cluster_text(&member_items);

        let topic_request = CompletionRequest::new(TOPIC_PROMPT, text.clone());
        let topic = registry
            .dispatch(TaskType::GenerateClusterTopic, None, &topic_request)
            .await?
            .text;

        let summary_request = CompletionRequest::new(SUMMARY_PROMPT, text);
        let summary = registry
            .dispatch(TaskType::SummarizeCluster, None, &summary_request)
            .await?
            .text;

        let item_ids: Vec<ItemId> = member_items.iter().map(|item| item.id).collect();
        let cluster = ClusterSummary::new(topic, summary, item_ids);
        if clusters.create(cluster).await.is_ok() {
            written += 1;
        }
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalbrief_core::{ChannelId, RawMessageId};

    fn item_with_embedding(embedding: Vec<f32>) -> Item {
        let mut item =
            Item::new_pending(RawMessageId::new(), ChannelId::from("c1"), "chan".into(), chrono::Utc::now());
        item.embedding = Some(embedding);
        item
    }

    #[test]
    fn items_without_embedding_never_cluster() {
        let items = vec![item_with_embedding(vec![]), Item::new_pending(
            RawMessageId::new(),
            ChannelId::from("c1"),
            "chan".into(),
            chrono::Utc::now(),
        )];
        let mut items = items;
        items[0].embedding = None;
        items[1].embedding = None;
        let components = connected_components(&items, 0.9);
        assert!(components.is_empty());
    }

    #[test]
    fn similar_items_form_one_component() {
        let items = vec![
            item_with_embedding(vec![1.0, 0.0]),
            item_with_embedding(vec![0.99, 0.01]),
            item_with_embedding(vec![0.0, 1.0]),
        ];
        let components = connected_components(&items, 0.9);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].len(), 2);
    }

    #[test]
    fn singleton_is_not_a_component() {
        let items = vec![item_with_embedding(vec![1.0, 0.0]), item_with_embedding(vec![0.0, 1.0])];
        let components = connected_components(&items, 0.9);
        assert!(components.is_empty());
    }

    #[tokio::test]
    async fn empty_items_writes_no_clusters() {
        let store = std::sync::Arc::new(signalbrief_repository_memory::MemoryStateStore::new());
        let lock = std::sync::Arc::new(signalbrief_repository_memory::MemoryDistributedLock::new());
        let budget = std::sync::Arc::new(signalbrief_llm::BudgetTracker::new(1_000_000, None));
        let registry = Registry::new(store, lock, budget);
        let clusters = signalbrief_repository_memory::MemoryClusterRepository::new();
        let written =
            run_cluster_sweep(&registry, &clusters, &[], &ClusterConfig::default()).await.unwrap();
        assert_eq!(written, 0);
    }
}
