//! Anthropic Messages API provider. No native embeddings endpoint, so
//! `embed` always reports a configuration error and the registry falls
//! through to whichever provider handles `TaskType::Embed`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::operation::{CompletionRequest, CompletionResponse};
use crate::provider::Provider;
use crate::rate_limiter::RateLimiter;

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub default_model: String,
    pub priority: i32,
    pub timeout_seconds: u64,
    pub rate_limit_per_sec: f64,
    pub rate_limit_burst: f64,
}

impl AnthropicConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, api_key: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: "https://api.anthropic.com/v1".into(),
            api_key: api_key.into(),
            default_model: default_model.into(),
            priority: 0,
            timeout_seconds: 30,
            rate_limit_per_sec: 5.0,
            rate_limit_burst: 10.0,
        }
    }
}

pub struct AnthropicProvider {
    config: AnthropicConfig,
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl AnthropicProvider {
    /// # Errors
    /// Returns [`ProviderError::Configuration`] if the HTTP client fails to build.
    pub fn new(config: AnthropicConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;
        let limiter = RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst);
        Ok(Self { config, client, limiter })
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn is_available(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    fn priority(&self) -> i32 {
        self.config.priority
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    fn resolve_model(&self, requested: &str) -> String {
        if requested.is_empty() {
            self.config.default_model.clone()
        } else {
            requested.to_owned()
        }
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        model: &str,
    ) -> Result<CompletionResponse, ProviderError> {
        self.limiter.acquire().await;

        let body = json!({
            "model": model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": request.system,
            "messages": [
                {"role": "user", "content": request.prompt},
            ]
        });

        debug!(provider = self.name(), model, "sending messages request");

        let response = self
            .client
            .post(format!("{}/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.config.timeout_seconds)
                } else {
                    ProviderError::Http(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(provider = self.name(), %status, "messages API returned error");
            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited(Duration::from_secs(1)));
            }
            return Err(ProviderError::Api(format!("HTTP {status}: {body}")));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let text = value
            .get("content")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("text"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ProviderError::Parse(format!("unexpected response shape: {value}")))?
            .to_owned();

        let prompt_tokens = value
            .get("usage")
            .and_then(|u| u.get("input_tokens"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0) as u32;
        let completion_tokens = value
            .get("usage")
            .and_then(|u| u.get("output_tokens"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0) as u32;

        Ok(CompletionResponse {
            text,
            prompt_tokens,
            completion_tokens,
        })
    }

    async fn embed(&self, _text: &str, _model: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::Configuration(format!(
            "{} has no embeddings endpoint",
            self.name()
        )))
    }
}
