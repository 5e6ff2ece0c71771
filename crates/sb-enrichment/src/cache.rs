//! Raw provider-response cache keyed by normalized query, with hit/miss
//! counting and a periodic stale-entry sweep.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use signalbrief_repository::EvidenceCacheRepository;

use crate::error::EnrichmentError;
use crate::provider::EvidenceHit;

#[derive(Debug, Default)]
pub struct CacheCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
}

impl CacheCounters {
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Normalize a query string for cache-key purposes: lowercase, trimmed,
/// internal whitespace collapsed.
#[must_use]
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

pub struct EvidenceCache {
    repository: Arc<dyn EvidenceCacheRepository>,
    ttl: chrono::Duration,
    counters: CacheCounters,
}

impl EvidenceCache {
    #[must_use]
    pub fn new(repository: Arc<dyn EvidenceCacheRepository>, ttl: chrono::Duration) -> Self {
        Self {
            repository,
            ttl,
            counters: CacheCounters::default(),
        }
    }

    #[must_use]
    pub fn counters(&self) -> &CacheCounters {
        &self.counters
    }

    /// Fetch cached hits for `query` against `provider`, if present.
    pub async fn get(&self, query: &str, provider: &str) -> Result<Option<Vec<EvidenceHit>>, EnrichmentError> {
        let normalized = normalize_query(query);
        match self.repository.get(&normalized, provider).await? {
            Some(raw) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                let hits = serde_json::from_str(&raw).map_err(|e| EnrichmentError::Provider(e.to_string()))?;
                Ok(Some(hits))
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    pub async fn save(&self, query: &str, provider: &str, hits: &[EvidenceHit]) -> Result<(), EnrichmentError> {
        let normalized = normalize_query(query);
        let raw = serde_json::to_string(hits).map_err(|e| EnrichmentError::Provider(e.to_string()))?;
        self.repository.save(&normalized, provider, &raw, self.ttl).await?;
        Ok(())
    }

    pub async fn purge_expired(&self) -> Result<u64, EnrichmentError> {
        Ok(self.repository.purge_expired().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalbrief_repository_memory::MemoryEvidenceCacheRepository;

    fn hit(url: &str) -> EvidenceHit {
        EvidenceHit {
            url: url.to_owned(),
            domain: "example.com".to_owned(),
            title: "t".into(),
            description: "d".into(),
            agreement_score: 0.5,
            is_contradiction: false,
        }
    }

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize_query("  Hello   World "), "hello world");
    }

    #[tokio::test]
    async fn miss_then_save_then_hit() {
        let cache = EvidenceCache::new(
            Arc::new(MemoryEvidenceCacheRepository::new()),
            chrono::Duration::hours(1),
        );

        assert!(cache.get("query", "provider").await.unwrap().is_none());
        assert_eq!(cache.counters().misses(), 1);

        cache
            .save("query", "provider", &[hit("https://example.com/a")])
            .await
            .unwrap();

        let cached = cache.get("Query", "provider").await.unwrap().unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cache.counters().hits(), 1);
    }
}
