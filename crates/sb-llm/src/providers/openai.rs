//! OpenAI-compatible chat-completions provider.
//!
//! Also serves any OpenAI-wire-compatible self-hosted endpoint (vLLM,
//! Ollama's OpenAI shim, etc.) since only the base URL and key differ.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::operation::{CompletionRequest, CompletionResponse};
use crate::provider::Provider;
use crate::rate_limiter::RateLimiter;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub default_model: String,
    pub embedding_model: String,
    pub priority: i32,
    pub timeout_seconds: u64,
    pub rate_limit_per_sec: f64,
    pub rate_limit_burst: f64,
}

impl OpenAiConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, api_key: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key: api_key.into(),
            default_model: default_model.into(),
            embedding_model: "text-embedding-3-small".into(),
            priority: 0,
            timeout_seconds: 30,
            rate_limit_per_sec: 5.0,
            rate_limit_burst: 10.0,
        }
    }
}

pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl OpenAiProvider {
    /// # Errors
    /// Returns [`ProviderError::Configuration`] if the HTTP client fails to build.
    pub fn new(config: OpenAiConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;
        let limiter = RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst);
        Ok(Self { config, client, limiter })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
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
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.prompt},
            ]
        });

        debug!(provider = self.name(), model, "sending chat completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
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
            warn!(provider = self.name(), %status, "chat completions API returned error");
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
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ProviderError::Parse(format!("unexpected response shape: {value}")))?
            .to_owned();

        let prompt_tokens = value
            .get("usage")
            .and_then(|u| u.get("prompt_tokens"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0) as u32;
        let completion_tokens = value
            .get("usage")
            .and_then(|u| u.get("completion_tokens"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0) as u32;

        Ok(CompletionResponse {
            text,
            prompt_tokens,
            completion_tokens,
        })
    }

    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>, ProviderError> {
        self.limiter.acquire().await;

        let model = if model.is_empty() { self.config.embedding_model.as_str() } else { model };
        let body = json!({"model": model, "input": text});

        let response = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .bearer_auth(&self.config.api_key)
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
            return Err(ProviderError::Api(format!("HTTP {status}: {body}")));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        value
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|d| d.get("embedding"))
            .and_then(serde_json::Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(serde_json::Value::as_f64)
                    .map(|f| f as f32)
                    .collect()
            })
            .ok_or_else(|| ProviderError::Parse(format!("unexpected embedding response shape: {value}")))
    }
}
