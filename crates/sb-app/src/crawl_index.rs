//! HTTP-backed [`CrawlIndex`]: the seam `signalbrief_links::seed` documents
//! as backed by "whatever full-text index runs the crawler" in a real
//! deployment. Grounded on `WebSearchProvider`'s `reqwest` client idiom —
//! same timeout/`bearer_auth`-free plain HTTP pattern, aimed at a search
//! index's own ingest API instead of a search API.

use std::time::Duration;

use async_trait::async_trait;
use signalbrief_links::{CrawlDocument, CrawlIndex, LinkError};

pub struct HttpCrawlIndex {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCrawlIndex {
    /// # Errors
    /// Returns [`LinkError`] if the HTTP client fails to build.
    pub fn new(base_url: impl Into<String>) -> Result<Self, LinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LinkError::Index(e.to_string()))?;
        Ok(Self { base_url: base_url.into(), client })
    }
}

#[async_trait]
impl CrawlIndex for HttpCrawlIndex {
    async fn pending_count(&self) -> Result<u64, LinkError> {
        let response = self
            .client
            .get(format!("{}/pending_count", self.base_url))
            .send()
            .await
            .map_err(|e| LinkError::Index(e.to_string()))?;
        let value: serde_json::Value =
            response.json().await.map_err(|e| LinkError::Index(e.to_string()))?;
        Ok(value.get("count").and_then(serde_json::Value::as_u64).unwrap_or(0))
    }

    async fn document_exists(&self, doc_id: &str) -> Result<bool, LinkError> {
        let response = self
            .client
            .get(format!("{}/documents/{doc_id}", self.base_url))
            .send()
            .await
            .map_err(|e| LinkError::Index(e.to_string()))?;
        Ok(response.status().is_success())
    }

    async fn index_document(&self, doc_id: &str, doc: CrawlDocument) -> Result<(), LinkError> {
        let body = serde_json::json!({
            "url": doc.url,
            "source": doc.source,
            "crawl_status": doc.crawl_status,
            "crawl_depth": doc.crawl_depth,
            "crawl_seed_source": doc.crawl_seed_source,
            "crawl_seed_ref": doc.crawl_seed_ref,
            "indexed_at": doc.indexed_at,
        });
        let response = self
            .client
            .put(format!("{}/documents/{doc_id}", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| LinkError::Index(e.to_string()))?;
        if !response.status().is_success() {
            return Err(LinkError::Index(format!("HTTP {}", response.status())));
        }
        Ok(())
    }
}
