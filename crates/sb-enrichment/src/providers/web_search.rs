//! A keyed open web search API. Availability is a key-present check per
//! spec — no ping, since a bad key only surfaces as a 401 on first use.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::EnrichmentError;
use crate::provider::{EvidenceHit, EvidenceProvider};

#[derive(Debug, Clone)]
pub struct WebSearchConfig {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub timeout_seconds: u64,
}

pub struct WebSearchProvider {
    config: WebSearchConfig,
    client: reqwest::Client,
}

impl WebSearchProvider {
    /// # Errors
    /// Returns [`EnrichmentError::Provider`] if the HTTP client fails to build.
    pub fn new(config: WebSearchConfig) -> Result<Self, EnrichmentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| EnrichmentError::Provider(e.to_string()))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl EvidenceProvider for WebSearchProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn is_available(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    async fn search(&self, query: &str) -> Result<Vec<EvidenceHit>, EnrichmentError> {
        let response = self
            .client
            .get(format!("{}/search", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .query(&[("q", query)])
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
            .get("webPages")
            .and_then(|p| p.get("value"))
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(results
            .into_iter()
            .filter_map(|entry| {
                let url = entry.get("url")?.as_str()?.to_owned();
                let domain = signalbrief_links::extract_domain(&url).ok()?;
                Some(EvidenceHit {
                    title: entry.get("name").and_then(serde_json::Value::as_str).unwrap_or_default().to_owned(),
                    description: entry
                        .get("snippet")
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
