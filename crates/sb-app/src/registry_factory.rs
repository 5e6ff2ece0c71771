//! Construct the LLM gateway [`Registry`] from [`LlmArgs`]: register
//! whichever providers have a key configured, apply the per-task model
//! override chains, and wire the shared daily budget tracker.

use std::sync::Arc;

use signalbrief_llm::{
    AnthropicConfig, AnthropicProvider, BudgetTracker, ChainEntry, OpenAiConfig, OpenAiProvider,
    Registry, TaskType,
};
use signalbrief_repository::{DistributedLock, StateStore};

use crate::config::LlmArgs;
use crate::error::AppError;

pub async fn build_registry(
    args: &LlmArgs,
    store: Arc<dyn StateStore>,
    lock: Arc<dyn DistributedLock>,
) -> Result<Registry, AppError> {
    let budget = Arc::new(BudgetTracker::new(args.llm_daily_token_budget, None));
    let registry = Registry::new(store, lock, budget);

    if let Some(ref api_key) = args.openai_api_key {
        let mut config = OpenAiConfig::new("openai", api_key.clone(), args.openai_model.clone());
        config.rate_limit_per_sec = args.rate_limit_rps;
        let provider = OpenAiProvider::new(config).map_err(|e| AppError::Config(format!("openai provider: {e}")))?;
        registry.register(Arc::new(provider)).await;
    }

    if let Some(ref api_key) = args.anthropic_api_key {
        let mut config = AnthropicConfig::new("anthropic", api_key.clone(), args.anthropic_model.clone());
        config.rate_limit_per_sec = args.rate_limit_rps;
        let provider =
            AnthropicProvider::new(config).map_err(|e| AppError::Config(format!("anthropic provider: {e}")))?;
        registry.register(Arc::new(provider)).await;
    }

    if let Some(ref model) = args.llm_summarize_model {
        registry.set_task_chain(
            TaskType::ProcessBatch,
            args.embedding_provider_order
                .iter()
                .map(|provider| ChainEntry { provider: provider.clone(), model: model.clone() })
                .collect(),
        );
    }

    if let Some(ref model) = args.llm_cluster_model {
        let chain: Vec<ChainEntry> = args
            .embedding_provider_order
            .iter()
            .map(|provider| ChainEntry { provider: provider.clone(), model: model.clone() })
            .collect();
        registry.set_task_chain(TaskType::GenerateClusterTopic, chain.clone());
        registry.set_task_chain(TaskType::SummarizeCluster, chain);
    }

    Ok(registry)
}
