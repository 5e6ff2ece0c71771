use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::EnrichmentError;
use crate::provider::{EvidenceHit, EvidenceProvider};

/// A mock evidence provider that returns a fixed set of hits for every query.
///
/// Tracks the number of calls via an atomic counter so tests can verify
/// caching and circuit-breaker behaviour.
pub struct MockEvidenceProvider {
    name: String,
    hits: Vec<EvidenceHit>,
    available: bool,
    calls: AtomicUsize,
}

impl MockEvidenceProvider {
    pub fn new(name: impl Into<String>, hits: Vec<EvidenceHit>) -> Self {
        Self {
            name: name.into(),
            hits,
            available: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EvidenceProvider for MockEvidenceProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn search(&self, _query: &str) -> Result<Vec<EvidenceHit>, EnrichmentError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.hits.clone())
    }
}

/// A mock evidence provider that maps specific queries to specific hit sets.
///
/// Unknown queries return an empty result rather than an error.
pub struct MappingEvidenceProvider {
    name: String,
    mappings: HashMap<String, Vec<EvidenceHit>>,
}

impl MappingEvidenceProvider {
    pub fn new(name: impl Into<String>, mappings: HashMap<String, Vec<EvidenceHit>>) -> Self {
        Self {
            name: name.into(),
            mappings,
        }
    }
}

#[async_trait]
impl EvidenceProvider for MappingEvidenceProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn search(&self, query: &str) -> Result<Vec<EvidenceHit>, EnrichmentError> {
        Ok(self.mappings.get(query).cloned().unwrap_or_default())
    }
}

/// A mock evidence provider that always errors, for circuit-breaker tests.
pub struct FailingEvidenceProvider {
    name: String,
}

impl FailingEvidenceProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl EvidenceProvider for FailingEvidenceProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn search(&self, _query: &str) -> Result<Vec<EvidenceHit>, EnrichmentError> {
        Err(EnrichmentError::Provider("mock failure".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str) -> EvidenceHit {
        EvidenceHit {
            url: url.to_owned(),
            domain: "example.com".to_owned(),
            title: "title".to_owned(),
            description: "description".to_owned(),
            agreement_score: 0.5,
            is_contradiction: false,
        }
    }

    #[tokio::test]
    async fn mock_returns_fixed_hits_and_counts_calls() {
        let provider = MockEvidenceProvider::new("mock", vec![hit("https://example.com/a")]);
        assert_eq!(provider.call_count(), 0);
        let result = provider.search("anything").await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn unavailable_mock_reports_unavailable() {
        let provider = MockEvidenceProvider::new("mock", vec![]).unavailable();
        assert!(!provider.is_available().await);
    }

    #[tokio::test]
    async fn mapping_returns_known_hits() {
        let mut mappings = HashMap::new();
        mappings.insert("known".to_owned(), vec![hit("https://example.com/b")]);
        let provider = MappingEvidenceProvider::new("mapping", mappings);

        assert_eq!(provider.search("known").await.unwrap().len(), 1);
        assert!(provider.search("unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_always_errors() {
        let provider = FailingEvidenceProvider::new("failing");
        assert!(provider.search("anything").await.is_err());
    }
}
