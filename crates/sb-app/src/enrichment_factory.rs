//! Construct the [`EnrichmentEngine`] from [`EnrichmentArgs`]: register
//! whichever evidence providers are configured, each behind its own
//! circuit breaker, wire the gateway-backed translator and the cache.

use std::sync::Arc;

use signalbrief_enrichment::{
    DomainFilterSettings, EnrichmentEngine, EnrichmentEngineConfig, EvidenceCache,
    GatewayTranslationClient, ProviderSlot, SelfHostedSearchConfig, SelfHostedSearchProvider,
    WebSearchConfig, WebSearchProvider,
};
use signalbrief_llm::{CircuitBreaker, CircuitBreakerConfig, Registry};
use signalbrief_repository::{DistributedLock, EvidenceCacheRepository, EvidenceRepository, StateStore};

use crate::config::{EnrichmentArgs, PipelineArgs};
use crate::error::AppError;
use crate::language_policy;

pub fn build_engine(
    args: &EnrichmentArgs,
    pipeline_args: &PipelineArgs,
    registry: Arc<Registry>,
    store: Arc<dyn StateStore>,
    lock: Arc<dyn DistributedLock>,
    evidence_cache_repository: Arc<dyn EvidenceCacheRepository>,
    evidence_repository: Arc<dyn EvidenceRepository>,
) -> Result<EnrichmentEngine, AppError> {
    let mut providers = Vec::new();

    if args.enrichment_providers.iter().any(|p| p == "web_search") {
        let api_key = args
            .web_search_api_key
            .clone()
            .ok_or_else(|| AppError::Config("web_search enabled but WEB_SEARCH_API_KEY unset".into()))?;
        let provider = WebSearchProvider::new(WebSearchConfig {
            name: "web_search".into(),
            base_url: args.web_search_base_url.clone(),
            api_key,
            timeout_seconds: 10,
        })
        .map_err(|e| AppError::Config(format!("web_search provider: {e}")))?;
        providers.push(ProviderSlot {
            provider: Arc::new(provider),
            breaker: Arc::new(CircuitBreaker::new(
                "web_search",
                CircuitBreakerConfig::default(),
                Arc::clone(&store),
                Arc::clone(&lock),
            )),
            cache_ttl: chrono::Duration::hours(6),
        });
    }

    if let Some(ref base_url) = args.self_hosted_search_url {
        let provider = SelfHostedSearchProvider::new(SelfHostedSearchConfig {
            name: "self_hosted_search".into(),
            base_url: base_url.clone(),
            timeout_seconds: 10,
        })
        .map_err(|e| AppError::Config(format!("self_hosted_search provider: {e}")))?;
        providers.push(ProviderSlot {
            provider: Arc::new(provider),
            breaker: Arc::new(CircuitBreaker::new(
                "self_hosted_search",
                CircuitBreakerConfig::default(),
                Arc::clone(&store),
                Arc::clone(&lock),
            )),
            cache_ttl: chrono::Duration::hours(6),
        });
    }

    let language_policy = match args.enrichment_language_policy {
        Some(ref raw) => language_policy::parse(raw)?,
        None => signalbrief_enrichment::LanguageRoutingPolicy::default(),
    };

    let config = EnrichmentEngineConfig {
        language_policy,
        domain_filter: DomainFilterSettings {
            allowlist: pipeline_args.domain_allowlist.clone(),
            denylist: pipeline_args.domain_denylist.clone(),
        },
        max_query_candidates: 3,
    };

    let translator = Arc::new(GatewayTranslationClient::new(registry));
    let cache = EvidenceCache::new(evidence_cache_repository, chrono::Duration::hours(6));

    Ok(EnrichmentEngine::new(config, providers, translator, cache, evidence_repository))
}
