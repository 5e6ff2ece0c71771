use async_trait::async_trait;

use crate::error::ProviderError;
use crate::operation::{CompletionRequest, CompletionResponse};

/// A single upstream LLM/embedding backend behind the gateway.
///
/// Each provider wraps its own HTTP client and rate limiter; the registry
/// never talks to a provider directly except through this trait.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap liveness check — key-present for API-keyed providers, an
    /// actual ping for self-hosted ones. Consulted before every dispatch
    /// attempt.
    async fn is_available(&self) -> bool;

    /// Higher sorts first in the registry's default ordering.
    fn priority(&self) -> i32;

    fn supports_image_generation(&self) -> bool {
        false
    }

    fn default_model(&self) -> &str;

    /// Map a possibly-foreign or empty model name onto this provider's own
    /// family, falling back to [`Provider::default_model`].
    fn resolve_model(&self, requested: &str) -> String;

    async fn complete(
        &self,
        request: &CompletionRequest,
        model: &str,
    ) -> Result<CompletionResponse, ProviderError>;

    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>, ProviderError>;

    async fn generate_image(&self, prompt: &str, model: &str) -> Result<Vec<u8>, ProviderError> {
        let _ = (prompt, model);
        Err(ProviderError::Configuration(format!(
            "{} does not support image generation",
            self.name()
        )))
    }
}
