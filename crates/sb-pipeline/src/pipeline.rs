//! Ties stages 1-6 together over a batch of raw messages. Stage 7
//! (clustering) is a separate periodic job — see [`crate::cluster`].

use signalbrief_core::{Item, ItemId, QueueItem, QueueKind, RawMessage};
use signalbrief_links::CrawlIndex;
use signalbrief_llm::{BatchInput, Registry};
use signalbrief_repository::{ItemRepository, LinkCacheRepository, QueueRepository};
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::dedup::{check_semantic_duplicate, check_strict_duplicate};
use crate::embed::embed_item;
use crate::error::PipelineError;
use crate::filter::{FilterInput, apply_filter};
use crate::link_resolve::{TelegramPeerResolver, resolve_and_seed};
use crate::summarize::{ThresholdOutcome, apply_thresholds, process_batch};

/// Per-message outcome, used by callers (and tests) to verify stage
/// attribution without re-reading the item back out of the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Dropped(&'static str),
    Duplicate(ItemId),
    Ready,
    Pending,
    Error,
}

/// Stage 2's 3-step extraction: JSON-tree walk over both entity/media
/// blobs, a text regex scan, and an `@mention` scan, merged into one
/// list. Mentions are turned into `t.me/<name>` links so they classify
/// and resolve the same way a written-out channel link would.
#[must_use]
pub fn extract_message_urls(message: &RawMessage) -> Vec<String> {
    let mut urls = signalbrief_links::extract_urls_from_text(&message.text);

    for blob in [&message.entities_json, &message.media_json] {
        if blob.is_empty() {
            continue;
        }
        match serde_json::from_slice::<serde_json::Value>(blob) {
            Ok(value) => urls.extend(signalbrief_links::extract_urls_from_json(&value)),
            Err(err) => warn!(error = %err, "failed to parse message json blob"),
        }
    }

    for mention in signalbrief_links::extract_mentions(&message.text) {
        urls.push(format!("https://t.me/{mention}"));
    }

    urls
}

/// Run stages 1-6 over one poll batch of raw messages. Messages that pass
/// stage 1 are grouped into one `ProcessBatch` call (stage 3), then each
/// surviving message proceeds independently through embed and dedup.
pub async fn process_raw_messages(
    registry: &Registry,
    items_repo: &dyn ItemRepository,
    link_cache: &dyn LinkCacheRepository,
    crawl_index: &dyn CrawlIndex,
    telegram: &dyn TelegramPeerResolver,
    queue: &dyn QueueRepository,
    config: &PipelineConfig,
    messages: &[RawMessage],
) -> Result<Vec<Outcome>, PipelineError> {
    let mut outcomes = vec![Outcome::Dropped("unprocessed"); messages.len()];
    let mut survivors = Vec::new();
    let mut extracted_urls: Vec<Vec<String>> = Vec::with_capacity(messages.len());

    for (i, message) in messages.iter().enumerate() {
        let urls = extract_message_urls(message);
        let domains: Vec<String> =
            urls.iter().filter_map(|url| signalbrief_links::extract_domain(url).ok()).collect();
        let filter_input =
            FilterInput { text: &message.text, domains: &domains, is_forward: message.is_forward };
        extracted_urls.push(urls);
        if let Some(reason) = apply_filter(&config.filter, &filter_input) {
            outcomes[i] = Outcome::Dropped(reason);
            continue;
        }
        survivors.push(i);
    }

    if survivors.is_empty() {
        return Ok(outcomes);
    }

    for &i in &survivors {
        let message = &messages[i];
        let urls = &extracted_urls[i];
        if !urls.is_empty() {
            let counters = resolve_and_seed(
                config,
                link_cache,
                crawl_index,
                telegram,
                urls,
                &message.channel_id.0,
                message.tg_message_id,
            )
            .await;
            debug!(indexed = counters.indexed, skipped = counters.skipped, "link seeding complete");
        }
    }

    let mut batch_inputs = Vec::with_capacity(survivors.len());
    for &i in &survivors {
        let titles = crate::link_resolve::lookup_resolved_titles(link_cache, &extracted_urls[i]).await;
        let resolved_link_context = if titles.is_empty() { None } else { Some(titles.join("; ")) };
        batch_inputs.push(BatchInput {
            channel_title: messages[i].channel_title.clone(),
            text: messages[i].text.clone(),
            resolved_link_context,
        });
    }

    let batch_results = process_batch(registry, &batch_inputs).await?;

    for (result_index, &i) in survivors.iter().enumerate() {
        let message = &messages[i];
        let mut item = Item::new_pending(
            message.id,
            message.channel_id.clone(),
            message.channel_title.clone(),
            message.tg_date,
        );

        let Some(result) = batch_results.iter().find(|r| r.index == result_index) else {
            outcomes[i] = Outcome::Dropped("missing_batch_result");
            continue;
        };

        item.relevance_score = result.relevance_score;
        item.importance_score = result.importance_score;
        item.topic = result.topic.clone();
        item.summary = result.summary.clone();
        item.language = result.language.clone();

        match apply_thresholds(
            result,
            message.channel_relevance_threshold,
            message.channel_importance_threshold,
        ) {
            ThresholdOutcome::Dropped => {
                item.drop_with_reason("below_threshold");
                items_repo.create(item).await?;
                outcomes[i] = Outcome::Dropped("below_threshold");
                continue;
            }
            ThresholdOutcome::Pending => {}
        }

        if let Some(existing) =
            check_strict_duplicate(items_repo, &message.channel_id, &message.canonical_hash).await?
        {
            item.mark_duplicate_of(existing);
            items_repo.create(item).await?;
            outcomes[i] = Outcome::Duplicate(existing);
            continue;
        }

        embed_item(registry, &mut item, &message.text).await;

        if item.embedding.is_some() {
            if let Some(existing) =
                check_semantic_duplicate(items_repo, item.embedding.as_deref(), &config.dedup).await?
            {
                item.mark_duplicate_of(existing);
                items_repo.create(item).await?;
                outcomes[i] = Outcome::Duplicate(existing);
                continue;
            }
        }

        if item.status == signalbrief_core::ItemStatus::Error {
            items_repo.create(item).await?;
            outcomes[i] = Outcome::Error;
            continue;
        }

        // An Item reaching this point has survived stages 1-6: it's the
        // enrichment queue's producer trigger, regardless of whether it
        // also clears the ready-preconditions gate below.
        let item_id = item.id;
        let mut payload = std::collections::HashMap::new();
        payload.insert("item_id".to_owned(), serde_json::json!(item_id));
        if let Err(err) = queue
            .enqueue(QueueKind::Enrichment, QueueItem::new_pending(QueueKind::Enrichment, payload))
            .await
        {
            warn!(error = %err, item_id = %item_id.0, "failed to enqueue enrichment job");
        }

        if item.meets_ready_preconditions(message.text.len(), config.short_text_threshold) {
            item.mark_ready();
            items_repo.create(item).await?;
            outcomes[i] = Outcome::Ready;
        } else {
            items_repo.create(item).await?;
            outcomes[i] = Outcome::Pending;
        }
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use signalbrief_core::{ChannelId, RawMessageId};
    use signalbrief_links::CrawlDocument;
    use signalbrief_repository_memory::{
        MemoryItemRepository, MemoryLinkCacheRepository, MemoryQueueRepository, MemoryRawMessageRepository,
    };
    use std::sync::Arc;

    #[derive(Default)]
    struct NoopCrawlIndex;
    #[async_trait]
    impl CrawlIndex for NoopCrawlIndex {
        async fn pending_count(&self) -> Result<u64, signalbrief_links::LinkError> {
            Ok(0)
        }
        async fn document_exists(&self, _doc_id: &str) -> Result<bool, signalbrief_links::LinkError> {
            Ok(false)
        }
        async fn index_document(
            &self,
            _doc_id: &str,
            _doc: CrawlDocument,
        ) -> Result<(), signalbrief_links::LinkError> {
            Ok(())
        }
    }

    struct NoopTelegramResolver;
    #[async_trait]
    impl TelegramPeerResolver for NoopTelegramResolver {
        async fn resolve(&self, _channel: &str) -> Option<crate::link_resolve::TelegramPeerInfo> {
            None
        }
    }

    fn sample_message(text: &str) -> RawMessage {
        RawMessage {
            id: RawMessageId::new(),
            channel_id: ChannelId::from("1"),
            channel_title: "chan".into(),
            channel_context: String::new(),
            tg_message_id: 1,
            tg_date: chrono::Utc::now(),
            text: text.into(),
            entities_json: Vec::new(),
            media_json: Vec::new(),
            media_data: None,
            canonical_hash: format!("hash-{text}"),
            is_forward: false,
            channel_relevance_threshold: 0.0,
            channel_importance_threshold: 0.0,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn filtered_message_never_reaches_batch_summarize() {
        let store = Arc::new(signalbrief_repository_memory::MemoryStateStore::new());
        let lock = Arc::new(signalbrief_repository_memory::MemoryDistributedLock::new());
        let budget = Arc::new(signalbrief_llm::BudgetTracker::new(1_000_000, None));
        let registry = Registry::new(store, lock, budget);

        let raw_repo = Arc::new(MemoryRawMessageRepository::new());
        let items_repo = MemoryItemRepository::new(raw_repo);
        let link_cache = MemoryLinkCacheRepository::new();
        let crawl_index = NoopCrawlIndex::default();
        let queue = MemoryQueueRepository::new();
        let config = PipelineConfig { filter: crate::config::FilterConfig { min_length: 100, ..Default::default() }, ..Default::default() };

        let messages = vec![sample_message("short")];
        let outcomes = process_raw_messages(
            &registry,
            &items_repo,
            &link_cache,
            &crawl_index,
            &NoopTelegramResolver,
            &queue,
            &config,
            &messages,
        )
        .await
        .unwrap();

        assert_eq!(outcomes, vec![Outcome::Dropped("too_short")]);
    }

    #[tokio::test]
    async fn no_survivors_returns_without_repository_writes() {
        let store = Arc::new(signalbrief_repository_memory::MemoryStateStore::new());
        let lock = Arc::new(signalbrief_repository_memory::MemoryDistributedLock::new());
        let budget = Arc::new(signalbrief_llm::BudgetTracker::new(1_000_000, None));
        let registry = Registry::new(store, lock, budget);

        let raw_repo = Arc::new(MemoryRawMessageRepository::new());
        let items_repo = MemoryItemRepository::new(raw_repo);
        let link_cache = MemoryLinkCacheRepository::new();
        let crawl_index = NoopCrawlIndex::default();
        let queue = MemoryQueueRepository::new();
        let config = PipelineConfig { filter: crate::config::FilterConfig { min_length: 100, ..Default::default() }, ..Default::default() };

        let messages = vec![sample_message("a"), sample_message("b")];
        let outcomes = process_raw_messages(
            &registry,
            &items_repo,
            &link_cache,
            &crawl_index,
            &NoopTelegramResolver,
            &queue,
            &config,
            &messages,
        )
        .await
        .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| matches!(o, Outcome::Dropped(_))));
    }

    #[tokio::test]
    async fn allowlist_domain_rule_matches_extracted_url() {
        use crate::filter::{FilterMode, FilterRule, RuleType};

        let store = Arc::new(signalbrief_repository_memory::MemoryStateStore::new());
        let lock = Arc::new(signalbrief_repository_memory::MemoryDistributedLock::new());
        let budget = Arc::new(signalbrief_llm::BudgetTracker::new(1_000_000, None));
        let registry = Registry::new(store, lock, budget);

        let raw_repo = Arc::new(MemoryRawMessageRepository::new());
        let items_repo = MemoryItemRepository::new(raw_repo);
        let link_cache = MemoryLinkCacheRepository::new();
        let crawl_index = NoopCrawlIndex::default();
        let queue = MemoryQueueRepository::new();
        let config = PipelineConfig {
            filter: crate::config::FilterConfig {
                mode: FilterMode::Allowlist,
                rules: vec![FilterRule::allow(RuleType::Domain, "trusted.example")],
                ..Default::default()
            },
            ..Default::default()
        };

        let allowed = sample_message("see https://trusted.example/report for details");
        let blocked = sample_message("see https://untrusted.example/report for details");
        let outcomes = process_raw_messages(
            &registry,
            &items_repo,
            &link_cache,
            &crawl_index,
            &NoopTelegramResolver,
            &queue,
            &config,
            &[allowed, blocked],
        )
        .await
        .unwrap();

        assert!(!matches!(outcomes[0], Outcome::Dropped(_)));
        assert_eq!(outcomes[1], Outcome::Dropped("not_allowlisted"));
    }
}
