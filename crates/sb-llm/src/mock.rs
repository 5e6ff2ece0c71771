//! Test double for [`Provider`], grounded on the teacher's mock evaluators:
//! fixed responses plus a call counter instead of a real HTTP round trip.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::operation::{CompletionRequest, CompletionResponse};
use crate::provider::Provider;

pub struct MockProvider {
    name: String,
    priority: i32,
    available: bool,
    response: Result<String, ProviderError>,
    embedding: Result<Vec<f32>, ProviderError>,
    pub call_count: AtomicUsize,
}

impl MockProvider {
    #[must_use]
    pub fn succeeding(name: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            available: true,
            response: Ok(response.into()),
            embedding: Ok(vec![0.0; 8]),
            call_count: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn failing(name: impl Into<String>, error: ProviderError) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            available: true,
            response: Err(error.clone()),
            embedding: Err(error),
            call_count: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    fn resolve_model(&self, requested: &str) -> String {
        if requested.is_empty() {
            "mock-model".to_owned()
        } else {
            requested.to_owned()
        }
    }

    async fn complete(
        &self,
        _request: &CompletionRequest,
        _model: &str,
    ) -> Result<CompletionResponse, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.response.clone().map(|text| CompletionResponse {
            text,
            prompt_tokens: 10,
            completion_tokens: 10,
        })
    }

    async fn embed(&self, _text: &str, _model: &str) -> Result<Vec<f32>, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.embedding.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest::new("system", "prompt")
    }

    #[tokio::test]
    async fn succeeding_mock_returns_configured_text() {
        let provider = MockProvider::succeeding("mock", "hello");
        let response = provider.complete(&request(), "mock-model").await.unwrap();
        assert_eq!(response.text, "hello");
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_mock_returns_error() {
        let provider = MockProvider::failing("mock", ProviderError::Api("boom".into()));
        let result = provider.complete(&request(), "mock-model").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unavailable_mock_reports_not_available() {
        let provider = MockProvider::succeeding("mock", "hello").unavailable();
        assert!(!provider.is_available().await);
    }
}
