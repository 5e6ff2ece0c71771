//! LLM and embedding gateway: a typed operation surface dispatched across
//! a priority-ordered, circuit-broken provider registry with task-aware
//! fallback chains, usage recording, and daily budget tracking.

pub mod circuit_breaker;
pub mod error;
pub mod mock;
pub mod operation;
pub mod parsing;
pub mod provider;
pub mod providers;
pub mod rate_limiter;
pub mod registry;
pub mod usage;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::{GatewayError, ProviderError};
pub use mock::MockProvider;
pub use operation::{
    BatchInput, BatchResult, CompletionRequest, CompletionResponse, RelevanceDecision, TaskType,
};
pub use parsing::parse_batch_response;
pub use provider::Provider;
pub use providers::{AnthropicConfig, AnthropicProvider, OpenAiConfig, OpenAiProvider};
pub use rate_limiter::RateLimiter;
pub use registry::{ChainEntry, Registry};
pub use usage::{BudgetCallback, BudgetEvent, BudgetTracker, UsageCounters, UsageRecorder};
