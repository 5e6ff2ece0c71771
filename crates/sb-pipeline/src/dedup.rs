//! Stages 5 and 6: strict dedup by canonical hash, then semantic dedup by
//! embedding cosine similarity within a lookback window.

use chrono::Utc;
use signalbrief_core::{ChannelId, ItemId};
use signalbrief_repository::{ItemRepository, RepositoryError};

use crate::config::DedupConfig;

/// Stage 5. Zero-dimension or missing embeddings never participate in
/// dedup on their own terms — that's handled by the caller skipping
/// stage 6 when `item.embedding` is `None`.
pub async fn check_strict_duplicate(
    items: &dyn ItemRepository,
    channel_id: &ChannelId,
    canonical_hash: &str,
) -> Result<Option<ItemId>, RepositoryError> {
    items.check_strict_duplicate(channel_id, canonical_hash).await
}

/// Stage 6. A `None`/empty embedding is treated as "no embedding" and
/// always returns `Ok(None)` rather than querying the repository.
pub async fn check_semantic_duplicate(
    items: &dyn ItemRepository,
    embedding: Option<&[f32]>,
    config: &DedupConfig,
) -> Result<Option<ItemId>, RepositoryError> {
    let Some(embedding) = embedding else {
        return Ok(None);
    };
    if embedding.is_empty() {
        return Ok(None);
    }
    items
        .find_similar(embedding, config.similarity_threshold, Utc::now() - config.window)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalbrief_core::{Item, RawMessageId};
    use signalbrief_repository_memory::{MemoryItemRepository, MemoryRawMessageRepository};
    use std::sync::Arc;

    fn repo() -> MemoryItemRepository {
        MemoryItemRepository::new(Arc::new(MemoryRawMessageRepository::new()))
    }

    #[tokio::test]
    async fn none_embedding_skips_semantic_lookup() {
        let repo = repo();
        let result = check_semantic_duplicate(&repo, None, &DedupConfig::default()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn empty_embedding_skips_semantic_lookup() {
        let repo = repo();
        let result =
            check_semantic_duplicate(&repo, Some(&[]), &DedupConfig::default()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn similar_embedding_within_window_is_a_duplicate() {
        let repo = repo();
        let mut item = Item::new_pending(
            RawMessageId::new(),
            ChannelId::from("c1"),
            "chan".into(),
            chrono::Utc::now(),
        );
        item.embedding = Some(vec![1.0, 0.0, 0.0]);
        let existing_id = item.id;
        repo.create(item).await.unwrap();

        let result = check_semantic_duplicate(
            &repo,
            Some(&[0.99, 0.01, 0.0]),
            &DedupConfig { window: chrono::Duration::hours(48), similarity_threshold: 0.9 },
        )
        .await
        .unwrap();
        assert_eq!(result, Some(existing_id));
    }
}
