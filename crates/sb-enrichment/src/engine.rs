//! Ties language routing, query generation, provider execution, domain
//! filtering, and evidence binding into the enrichment worker loop's
//! per-item processing step.

use std::sync::Arc;

use signalbrief_core::{EvidenceSource, EvidenceSourceId, EvidenceSummary, Item};
use signalbrief_llm::CircuitBreaker;
use signalbrief_repository::EvidenceRepository;
use tracing::{debug, warn};

use crate::cache::EvidenceCache;
use crate::domain_filter::{DomainFilterSettings, filter_by_domain};
use crate::error::EnrichmentError;
use crate::language::LanguageRoutingPolicy;
use crate::provider::{EvidenceHit, EvidenceProvider};
use crate::query::{QueryContext, expand_with_translations, generate_queries};
use crate::translate::TranslationClient;

/// One configured evidence provider plus the circuit breaker guarding it.
pub struct ProviderSlot {
    pub provider: Arc<dyn EvidenceProvider>,
    pub breaker: Arc<CircuitBreaker>,
    pub cache_ttl: chrono::Duration,
}

pub struct EnrichmentEngineConfig {
    pub language_policy: LanguageRoutingPolicy,
    pub domain_filter: DomainFilterSettings,
    pub max_query_candidates: usize,
}

impl Default for EnrichmentEngineConfig {
    fn default() -> Self {
        Self {
            language_policy: LanguageRoutingPolicy::default(),
            domain_filter: DomainFilterSettings::default(),
            max_query_candidates: 3,
        }
    }
}

/// Everything needed to run step 1-5 of the enrichment worker loop for one
/// item: language routing, query generation, provider execution, domain
/// filtering, and evidence binding.
pub struct EnrichmentEngine {
    config: EnrichmentEngineConfig,
    providers: Vec<ProviderSlot>,
    translator: Arc<dyn TranslationClient>,
    cache: EvidenceCache,
    evidence_repository: Arc<dyn EvidenceRepository>,
}

/// Context for a single item's enrichment pass: everything the language
/// router and query generator need, gathered by the caller from the
/// item's `RawMessage` and resolved links.
pub struct ItemEnrichmentContext<'a> {
    pub item: &'a Item,
    pub channel_context: &'a str,
    pub full_text: &'a str,
    pub resolved_link_titles: &'a [String],
}

impl EnrichmentEngine {
    #[must_use]
    pub fn new(
        config: EnrichmentEngineConfig,
        providers: Vec<ProviderSlot>,
        translator: Arc<dyn TranslationClient>,
        cache: EvidenceCache,
        evidence_repository: Arc<dyn EvidenceRepository>,
    ) -> Self {
        Self {
            config,
            providers,
            translator,
            cache,
            evidence_repository,
        }
    }

    /// Run the full worker-loop pass for one item and persist the bound
    /// evidence. Returns the resulting [`EvidenceSummary`].
    pub async fn process_item(
        &self,
        ctx: &ItemEnrichmentContext<'_>,
    ) -> Result<EvidenceSummary, EnrichmentError> {
        let item = ctx.item;

        let target_languages = self.config.language_policy.target_languages(
            &item.source_channel_id.to_string(),
            &item.topic,
            ctx.channel_context,
        );

        let query_ctx = QueryContext {
            summary: &item.summary,
            full_text: ctx.full_text,
            topic: &item.topic,
            channel_title: &item.source_channel_title,
            resolved_link_titles: ctx.resolved_link_titles,
        };
        let base_queries = generate_queries(&query_ctx, self.config.max_query_candidates);
        let queries = expand_with_translations(
            &base_queries,
            &target_languages,
            &item.language,
            &self.translator,
        )
        .await;

        let mut hits = Vec::new();
        for slot in &self.providers {
            hits.extend(self.search_provider(slot, &queries).await);
        }

        let filtered = filter_by_domain(hits, &self.config.domain_filter);
        let deduped = dedup_by_url(filtered);

        let sources: Vec<EvidenceSource> = deduped
            .into_iter()
            .map(|hit| {
                let mut source = EvidenceSource {
                    id: EvidenceSourceId::new(),
                    item_id: item.id,
                    url: hit.url,
                    domain: hit.domain,
                    title: hit.title,
                    description: hit.description,
                    agreement_score: hit.agreement_score,
                    is_contradiction: hit.is_contradiction,
                };
                source.clamp_agreement();
                source
            })
            .collect();

        let summary = EvidenceSummary::from_sources(&sources);
        self.evidence_repository.replace_for_item(item.id, sources).await?;

        Ok(summary)
    }

    /// Search one provider across all queries, honoring its circuit
    /// breaker and availability probe and going through the cache first.
    async fn search_provider(&self, slot: &ProviderSlot, queries: &[String]) -> Vec<EvidenceHit> {
        let name = slot.provider.name().to_owned();

        if !slot.provider.is_available().await {
            debug!(provider = %name, "provider unavailable, skipping");
            return Vec::new();
        }
        if !slot.breaker.can_attempt().await {
            debug!(provider = %name, "circuit open, skipping");
            return Vec::new();
        }

        let mut hits = Vec::new();
        let mut any_failure = false;

        for query in queries {
            match self.cache.get(query, &name).await {
                Ok(Some(cached)) => {
                    hits.extend(cached);
                    continue;
                }
                Ok(None) => {}
                Err(err) => warn!(provider = %name, error = %err, "cache read failed"),
            }

            match slot.provider.search(query).await {
                Ok(found) => {
                    if let Err(err) = self.cache.save(query, &name, &found).await {
                        warn!(provider = %name, error = %err, "cache write failed");
                    }
                    hits.extend(found);
                }
                Err(err) => {
                    warn!(provider = %name, error = %err, "evidence search failed");
                    any_failure = true;
                }
            }
        }

        if any_failure {
            slot.breaker.record_failure().await;
        } else {
            slot.breaker.record_success().await;
        }

        hits
    }

    pub async fn purge_expired_cache(&self) -> Result<u64, EnrichmentError> {
        self.cache.purge_expired().await
    }
}

fn dedup_by_url(hits: Vec<EvidenceHit>) -> Vec<EvidenceHit> {
    let mut seen = std::collections::HashSet::new();
    hits.into_iter().filter(|h| seen.insert(h.url.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FailingEvidenceProvider, MockEvidenceProvider};
    use signalbrief_core::ChannelId;
    use signalbrief_repository_memory::{
        MemoryDistributedLock, MemoryEvidenceCacheRepository, MemoryEvidenceRepository,
        MemoryStateStore,
    };

    fn hit(url: &str, domain: &str) -> EvidenceHit {
        EvidenceHit {
            url: url.to_owned(),
            domain: domain.to_owned(),
            title: "title".into(),
            description: "description".into(),
            agreement_score: 0.7,
            is_contradiction: false,
        }
    }

    struct NoopTranslator;

    #[async_trait::async_trait]
    impl TranslationClient for NoopTranslator {
        async fn translate(&self, text: &str, _target_language: &str) -> Result<String, EnrichmentError> {
            Ok(text.to_owned())
        }
    }

    fn sample_item() -> Item {
        let mut item = Item::new_pending(
            signalbrief_core::RawMessageId::new(),
            ChannelId::from("chan-1"),
            "Channel".into(),
            chrono::Utc::now(),
        );
        item.summary = "breaking news summary".into();
        item.topic = "politics".into();
        item.language = "en".into();
        item
    }

    fn breaker() -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(
            "provider",
            signalbrief_llm::CircuitBreakerConfig::default(),
            Arc::new(MemoryStateStore::new()),
            Arc::new(MemoryDistributedLock::new()),
        ))
    }

    #[tokio::test]
    async fn binds_deduplicated_evidence_and_returns_summary() {
        let provider = Arc::new(MockEvidenceProvider::new(
            "mock",
            vec![hit("https://a.com/1", "a.com"), hit("https://a.com/1", "a.com")],
        ));
        let engine = EnrichmentEngine::new(
            EnrichmentEngineConfig::default(),
            vec![ProviderSlot {
                provider,
                breaker: breaker(),
                cache_ttl: chrono::Duration::hours(1),
            }],
            Arc::new(NoopTranslator),
            EvidenceCache::new(Arc::new(MemoryEvidenceCacheRepository::new()), chrono::Duration::hours(1)),
            Arc::new(MemoryEvidenceRepository::new()),
        );

        let item = sample_item();
        let ctx = ItemEnrichmentContext {
            item: &item,
            channel_context: "",
            full_text: "full text",
            resolved_link_titles: &[],
        };

        let summary = engine.process_item(&ctx).await.unwrap();
        assert_eq!(summary.domain_histogram.get("a.com"), Some(&1));
    }

    #[tokio::test]
    async fn domain_denylist_drops_matching_evidence() {
        let provider = Arc::new(MockEvidenceProvider::new(
            "mock",
            vec![hit("https://blocked.com/1", "blocked.com")],
        ));
        let mut config = EnrichmentEngineConfig::default();
        config.domain_filter.denylist = vec!["blocked.com".into()];

        let engine = EnrichmentEngine::new(
            config,
            vec![ProviderSlot {
                provider,
                breaker: breaker(),
                cache_ttl: chrono::Duration::hours(1),
            }],
            Arc::new(NoopTranslator),
            EvidenceCache::new(Arc::new(MemoryEvidenceCacheRepository::new()), chrono::Duration::hours(1)),
            Arc::new(MemoryEvidenceRepository::new()),
        );

        let item = sample_item();
        let ctx = ItemEnrichmentContext {
            item: &item,
            channel_context: "",
            full_text: "full text",
            resolved_link_titles: &[],
        };

        let summary = engine.process_item(&ctx).await.unwrap();
        assert!(summary.domain_histogram.is_empty());
    }

    #[tokio::test]
    async fn failing_provider_trips_breaker_without_erroring_the_item() {
        let provider = Arc::new(FailingEvidenceProvider::new("failing"));
        let cb = breaker();
        let engine = EnrichmentEngine::new(
            EnrichmentEngineConfig::default(),
            vec![ProviderSlot {
                provider,
                breaker: Arc::clone(&cb),
                cache_ttl: chrono::Duration::hours(1),
            }],
            Arc::new(NoopTranslator),
            EvidenceCache::new(Arc::new(MemoryEvidenceCacheRepository::new()), chrono::Duration::hours(1)),
            Arc::new(MemoryEvidenceRepository::new()),
        );

        let item = sample_item();
        let ctx = ItemEnrichmentContext {
            item: &item,
            channel_context: "",
            full_text: "full text",
            resolved_link_titles: &[],
        };

        let summary = engine.process_item(&ctx).await.unwrap();
        assert_eq!(summary.corroboration_score, 0.0);
    }
}
