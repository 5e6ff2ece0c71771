//! Evidence-provider enrichment engine: language routing, query
//! generation and translation expansion, multi-provider evidence search
//! with per-provider circuit breakers, domain filtering, caching, and
//! evidence binding.

pub mod cache;
pub mod domain_filter;
pub mod engine;
pub mod error;
pub mod language;
pub mod mock;
pub mod provider;
pub mod providers;
pub mod query;
pub mod translate;

pub use cache::{CacheCounters, EvidenceCache, normalize_query};
pub use domain_filter::{DomainFilterSettings, filter_by_domain};
pub use engine::{EnrichmentEngine, EnrichmentEngineConfig, ItemEnrichmentContext, ProviderSlot};
pub use error::EnrichmentError;
pub use language::LanguageRoutingPolicy;
pub use provider::{EvidenceHit, EvidenceProvider};
pub use providers::{SelfHostedSearchConfig, SelfHostedSearchProvider, WebSearchConfig, WebSearchProvider};
pub use query::{QueryContext, expand_with_translations, generate_queries};
pub use translate::{GatewayTranslationClient, TranslationClient};
