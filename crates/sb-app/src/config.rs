//! Typed configuration groups, each wired to the env vars spec'd for the
//! core: provider keys, gateway/circuit tunables, worker intervals, filter
//! thresholds, enrichment provider endpoints and budgets, storage backend
//! selection, and the HTTP bind address. `clap`'s `env` attribute handles
//! the `--flag`/`ENV_VAR` duality the way `acteon-cli`'s global args do.

use clap::Args;
use signalbrief_pipeline::{ClusterConfig, DedupConfig, FilterConfig, FilterMode, PipelineConfig};
use signalbrief_pipeline::{FilterRule, RuleType};

#[derive(Args, Debug, Clone)]
pub struct StateArgs {
    /// Storage backend: "memory" or "postgres".
    #[arg(long, env = "STATE_BACKEND", default_value = "memory")]
    pub state_backend: String,

    /// `PostgreSQL` connection URL, required when `state_backend = postgres`.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "DATABASE_POOL_SIZE", default_value_t = 5)]
    pub database_pool_size: u32,

    #[arg(long, env = "DATABASE_TABLE_PREFIX", default_value = "sb_")]
    pub database_table_prefix: String,
}

#[derive(Args, Debug, Clone)]
pub struct LlmArgs {
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    pub openai_model: String,

    #[arg(long, env = "ANTHROPIC_API_KEY")]
    pub anthropic_api_key: Option<String>,

    #[arg(long, env = "ANTHROPIC_MODEL", default_value = "claude-3-5-haiku-20241022")]
    pub anthropic_model: String,

    /// Provider name order for embedding dispatch (comma-separated),
    /// e.g. "openai,anthropic". Unlisted registered providers are tried
    /// last in registration order.
    #[arg(long, env = "EMBEDDING_PROVIDER_ORDER", value_delimiter = ',')]
    pub embedding_provider_order: Vec<String>,

    #[arg(long, env = "LLM_CIRCUIT_THRESHOLD", default_value_t = 5)]
    pub llm_circuit_threshold: u32,

    #[arg(long, env = "LLM_CIRCUIT_TIMEOUT", default_value_t = 60)]
    pub llm_circuit_timeout_seconds: u64,

    #[arg(long, env = "RATE_LIMIT_RPS", default_value_t = 5.0)]
    pub rate_limit_rps: f64,

    #[arg(long, env = "LLM_DAILY_TOKEN_BUDGET", default_value_t = 0)]
    pub llm_daily_token_budget: u64,

    #[arg(long, env = "LLM_SUMMARIZE_MODEL")]
    pub llm_summarize_model: Option<String>,

    #[arg(long, env = "LLM_CLUSTER_MODEL")]
    pub llm_cluster_model: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct WorkerArgs {
    #[arg(long, env = "WORKER_POLL_INTERVAL", default_value_t = 10)]
    pub worker_poll_interval_seconds: u64,

    #[arg(long, env = "WORKER_POLL_BATCH", default_value_t = 50)]
    pub worker_poll_batch: usize,

    /// How often the clustering sweep runs, in seconds.
    #[arg(long, env = "CLUSTER_SWEEP_INTERVAL", default_value_t = 300)]
    pub cluster_sweep_interval_seconds: u64,
}

#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    #[arg(long, env = "MAX_LINKS_PER_MESSAGE", default_value_t = 10)]
    pub max_links_per_message: usize,

    #[arg(long, env = "DOMAIN_ALLOWLIST", value_delimiter = ',')]
    pub domain_allowlist: Vec<String>,

    #[arg(long, env = "DOMAIN_DENYLIST", value_delimiter = ',')]
    pub domain_denylist: Vec<String>,

    #[arg(long, env = "LINK_SEED_EXT_DENYLIST", value_delimiter = ',')]
    pub link_seed_ext_denylist: Vec<String>,

    #[arg(long, env = "CRAWLER_QUEUE_MAX_PENDING", default_value_t = 10_000)]
    pub crawler_queue_max_pending: u64,

    #[arg(long, env = "SEARCH_INDEX_URL", default_value = "")]
    pub search_index_url: String,
}

impl PipelineArgs {
    #[must_use]
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        let mut rules = Vec::new();
        for domain in &self.domain_allowlist {
            rules.push(FilterRule::allow(RuleType::Domain, domain.clone()));
        }
        for domain in &self.domain_denylist {
            rules.push(FilterRule::deny(RuleType::Domain, domain.clone()));
        }
        let mode = if self.domain_allowlist.is_empty() && self.domain_denylist.is_empty() {
            FilterMode::Mixed
        } else if self.domain_denylist.is_empty() {
            FilterMode::Allowlist
        } else {
            FilterMode::Mixed
        };

        PipelineConfig {
            filter: FilterConfig { mode, rules, ..FilterConfig::default() },
            dedup: DedupConfig::default(),
            cluster: ClusterConfig::default(),
            seeding: signalbrief_links::SeedingSettings {
                enabled: !self.search_index_url.is_empty(),
                search_index_url: self.search_index_url.clone(),
                max_pending: self.crawler_queue_max_pending,
                max_links_per_message: self.max_links_per_message,
                ext_denylist: self.link_seed_ext_denylist.clone(),
                domain_denylist: self.domain_denylist.clone(),
                domain_allowlist: self.domain_allowlist.clone(),
            },
            ..PipelineConfig::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EnrichmentArgs {
    /// Providers to enable (comma-separated): "web_search", "self_hosted".
    #[arg(long, env = "ENRICHMENT_PROVIDERS", value_delimiter = ',')]
    pub enrichment_providers: Vec<String>,

    #[arg(long, env = "WEB_SEARCH_API_KEY")]
    pub web_search_api_key: Option<String>,

    #[arg(long, env = "WEB_SEARCH_BASE_URL", default_value = "https://api.bing.microsoft.com/v7.0")]
    pub web_search_base_url: String,

    #[arg(long, env = "SELF_HOSTED_SEARCH_URL")]
    pub self_hosted_search_url: Option<String>,

    #[arg(long, env = "ENRICHMENT_DAILY_LIMIT", default_value_t = 0)]
    pub enrichment_daily_limit: u64,

    #[arg(long, env = "ENRICHMENT_MONTHLY_LIMIT", default_value_t = 0)]
    pub enrichment_monthly_limit: u64,

    /// JSON-encoded `LanguageRoutingPolicy` override; default policy used
    /// when absent.
    #[arg(long, env = "ENRICHMENT_LANGUAGE_POLICY")]
    pub enrichment_language_policy: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct HttpArgs {
    #[arg(long, env = "HTTP_HOST", default_value = "127.0.0.1")]
    pub http_host: String,

    #[arg(long, env = "HTTP_PORT", default_value_t = 8080)]
    pub http_port: u16,
}
