//! A self-hosted full-text/news search instance (e.g. a SearxNG-style
//! meta-search deployment). Availability is probed with an HTTP ping
//! rather than a key-present check, since there's no key to check.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::EnrichmentError;
use crate::provider::{EvidenceHit, EvidenceProvider};

#[derive(Debug, Clone)]
pub struct SelfHostedSearchConfig {
    pub name: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

pub struct SelfHostedSearchProvider {
    config: SelfHostedSearchConfig,
    client: reqwest::Client,
}

impl SelfHostedSearchProvider {
    /// # Errors
    /// Returns [`EnrichmentError::Provider`] if the HTTP client fails to build.
    pub fn new(config: SelfHostedSearchConfig) -> Result<Self, EnrichmentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| EnrichmentError::Provider(e.to_string()))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl EvidenceProvider for SelfHostedSearchProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn is_available(&self) -> bool {
        match self
            .client
            .get(format!("{}/healthz", self.config.base_url))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                warn!(provider = self.name(), error = %err, "self-hosted search ping failed");
                false
            }
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<EvidenceHit>, EnrichmentError> {
        let response = self
            .client
            .get(format!("{}/search", self.config.base_url))
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| EnrichmentError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EnrichmentError::Provider(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EnrichmentError::Provider(e.to_string()))?;

        let results = value
            .get("results")
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(results
            .into_iter()
            .filter_map(|entry| {
                let url = entry.get("url")?.as_str()?.to_owned();
                let domain = signalbrief_links::extract_domain(&url).ok()?;
                Some(EvidenceHit {
                    title: entry.get("title").and_then(serde_json::Value::as_str).unwrap_or_default().to_owned(),
                    description: entry
                        .get("content")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default()
                        .to_owned(),
                    domain,
                    url,
                    agreement_score: 0.5,
                    is_contradiction: false,
                })
            })
            .collect())
    }
}
