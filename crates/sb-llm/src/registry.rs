//! Provider registry and the task-aware fallback dispatch algorithm.

use std::sync::Arc;

use dashmap::DashMap;
use signalbrief_repository::{DistributedLock, StateStore};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::error::{GatewayError, ProviderError};
use crate::operation::{CompletionRequest, CompletionResponse, TaskType};
use crate::provider::Provider;
use crate::usage::{BudgetTracker, UsageRecorder};

/// One entry in a task's provider chain: provider name plus the model to
/// request from it (empty string means "use the provider's default").
#[derive(Debug, Clone)]
pub struct ChainEntry {
    pub provider: String,
    pub model: String,
}

/// Holds the ordered provider list, one circuit breaker per provider, the
/// per-task fallback chain table, and the usage/budget collaborators.
pub struct Registry {
    providers: RwLock<Vec<Arc<dyn Provider>>>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    task_chains: DashMap<TaskType, Vec<ChainEntry>>,
    store: Arc<dyn StateStore>,
    lock: Arc<dyn DistributedLock>,
    breaker_config: CircuitBreakerConfig,
    pub usage: Arc<UsageRecorder>,
    pub budget: Arc<BudgetTracker>,
}

impl Registry {
    #[must_use]
    pub fn new(
        store: Arc<dyn StateStore>,
        lock: Arc<dyn DistributedLock>,
        budget: Arc<BudgetTracker>,
    ) -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            breakers: DashMap::new(),
            task_chains: DashMap::new(),
            usage: Arc::new(UsageRecorder::new(Arc::clone(&store))),
            store,
            lock,
            breaker_config: CircuitBreakerConfig::default(),
            budget,
        }
    }

    /// Insert a provider and re-sort the registry by descending priority.
    pub async fn register(&self, provider: Arc<dyn Provider>) {
        let name = provider.name().to_owned();
        self.breakers.entry(name).or_insert_with(|| {
            Arc::new(CircuitBreaker::new(
                provider.name(),
                self.breaker_config.clone(),
                Arc::clone(&self.store),
                Arc::clone(&self.lock),
            ))
        });

        let mut providers = self.providers.write().await;
        providers.push(provider);
        providers.sort_by_key(|p| std::cmp::Reverse(p.priority()));
    }

    pub fn set_task_chain(&self, task: TaskType, chain: Vec<ChainEntry>) {
        self.task_chains.insert(task, chain);
    }

    async fn provider_by_name(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .read()
            .await
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }

    /// Compose the candidate chain for a task: task-specific entries
    /// first, then any registered providers not already in the chain
    /// (with an empty model, so the provider's default applies).
    async fn candidate_chain(&self, task: TaskType) -> Vec<ChainEntry> {
        let mut chain = self.task_chains.get(&task).map(|c| c.clone()).unwrap_or_default();
        let seen: std::collections::HashSet<String> =
            chain.iter().map(|e| e.provider.clone()).collect();

        for provider in self.providers.read().await.iter() {
            if !seen.contains(provider.name()) {
                chain.push(ChainEntry {
                    provider: provider.name().to_owned(),
                    model: String::new(),
                });
            }
        }
        chain
    }

    /// Run the task-aware fallback algorithm for a text-completion call.
    pub async fn dispatch(
        &self,
        task: TaskType,
        model_override: Option<&str>,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, GatewayError> {
        let chain = self.candidate_chain(task).await;
        let mut last_error: Option<ProviderError> = None;
        let mut attempted = 0usize;

        for entry in &chain {
            let Some(provider) = self.provider_by_name(&entry.provider).await else {
                continue;
            };
            if !provider.is_available().await {
                continue;
            }
            let Some(breaker) = self.breakers.get(&entry.provider).map(|b| Arc::clone(&b)) else {
                continue;
            };
            if !breaker.can_attempt().await {
                continue;
            }

            let requested = model_override
                .filter(|m| !m.is_empty())
                .or_else(|| if entry.model.is_empty() { None } else { Some(entry.model.as_str()) })
                .unwrap_or("");
            let model = provider.resolve_model(requested);

            match provider.complete(request, &model).await {
                Ok(response) => {
                    breaker.record_success().await;
                    self.usage
                        .record_success(
                            provider.name(),
                            &model,
                            task,
                            response.prompt_tokens,
                            response.completion_tokens,
                            &self.budget,
                        )
                        .await;
                    if attempted > 0 {
                        info!(provider = provider.name(), task = task.label(), "used fallback provider");
                    }
                    return Ok(response);
                }
                Err(e) => {
                    breaker.record_failure().await;
                    self.usage.record_error(provider.name(), &model, task).await;
                    warn!(provider = provider.name(), task = task.label(), error = %e, "provider call failed");
                    attempted += 1;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(GatewayError::AllProvidersFailed(e)),
            None => Err(GatewayError::NoProvidersAvailable),
        }
    }

    /// `Embed` follows the same chain-selection rules but calls
    /// `Provider::embed` instead of `complete`.
    pub async fn dispatch_embed(
        &self,
        model_override: Option<&str>,
        text: &str,
    ) -> Result<Vec<f32>, GatewayError> {
        let chain = self.candidate_chain(TaskType::Embed).await;
        let mut last_error: Option<ProviderError> = None;

        for entry in &chain {
            let Some(provider) = self.provider_by_name(&entry.provider).await else {
                continue;
            };
            if !provider.is_available().await {
                continue;
            }
            let Some(breaker) = self.breakers.get(&entry.provider).map(|b| Arc::clone(&b)) else {
                continue;
            };
            if !breaker.can_attempt().await {
                continue;
            }

            let requested = model_override
                .filter(|m| !m.is_empty())
                .or_else(|| if entry.model.is_empty() { None } else { Some(entry.model.as_str()) })
                .unwrap_or("");
            let model = provider.resolve_model(requested);

            match provider.embed(text, &model).await {
                Ok(vector) => {
                    breaker.record_success().await;
                    self.usage
                        .record_success(provider.name(), &model, TaskType::Embed, 0, 0, &self.budget)
                        .await;
                    return Ok(vector);
                }
                Err(e) => {
                    breaker.record_failure().await;
                    self.usage
                        .record_error(provider.name(), &model, TaskType::Embed)
                        .await;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(GatewayError::AllProvidersFailed(e)),
            None => Err(GatewayError::NoProvidersAvailable),
        }
    }

    /// Image generation is restricted to providers advertising
    /// `supports_image_generation()`.
    pub async fn dispatch_image(
        &self,
        model_override: Option<&str>,
        prompt: &str,
    ) -> Result<Vec<u8>, GatewayError> {
        let providers = self.providers.read().await;
        let candidates: Vec<_> = providers
            .iter()
            .filter(|p| p.supports_image_generation())
            .cloned()
            .collect();
        drop(providers);

        if candidates.is_empty() {
            return Err(GatewayError::NoImageProvider);
        }

        let mut last_error: Option<ProviderError> = None;
        for provider in candidates {
            if !provider.is_available().await {
                continue;
            }
            let model = provider.resolve_model(model_override.unwrap_or(""));
            match provider.generate_image(prompt, &model).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) => Err(GatewayError::AllProvidersFailed(e)),
            None => Err(GatewayError::NoImageProvider),
        }
    }
}
