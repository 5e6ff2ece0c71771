//! Translation client used by query expansion. Delegates to the LLM
//! gateway's `TranslateText` operation rather than a separate provider
//! stack, and caches results keyed by `(source_text, target_language)`.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use signalbrief_llm::{CompletionRequest, Registry, TaskType};

use crate::error::EnrichmentError;

#[async_trait]
pub trait TranslationClient: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, EnrichmentError>;
}

/// Gateway-backed translation client with an in-memory `(text, lang)` cache.
///
/// Grounded on the gateway's own `Embed`/`CompleteText` dispatch: translation
/// is just another `TaskType` on the same registry, no separate client.
pub struct GatewayTranslationClient {
    registry: Arc<Registry>,
    cache: DashMap<(String, String), String>,
}

impl GatewayTranslationClient {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            cache: DashMap::new(),
        }
    }
}

#[async_trait]
impl TranslationClient for GatewayTranslationClient {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, EnrichmentError> {
        let key = (text.to_owned(), target_language.to_owned());
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }

        let request = CompletionRequest::new(
            format!("Translate the user's text into {target_language}. Reply with only the translation."),
            text,
        );
        let response = self
            .registry
            .dispatch(TaskType::TranslateText, None, &request)
            .await
            .map_err(|e| EnrichmentError::Translation(e.to_string()))?;

        self.cache.insert(key, response.text.clone());
        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingClient {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl TranslationClient for CountingClient {
        async fn translate(&self, text: &str, target_language: &str) -> Result<String, EnrichmentError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Ok(format!("[{target_language}] {text}"))
        }
    }

    #[tokio::test]
    async fn trait_object_delegates_through() {
        let client = CountingClient {
            calls: std::sync::atomic::AtomicUsize::new(0),
        };
        let translated = client.translate("hello", "ru").await.unwrap();
        assert_eq!(translated, "[ru] hello");
        assert_eq!(client.calls.load(std::sync::atomic::Ordering::Relaxed), 1);
    }
}
