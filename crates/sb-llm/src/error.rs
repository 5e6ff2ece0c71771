use thiserror::Error;

/// Errors surfaced by a single provider call.
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("failed to parse provider response: {0}")]
    Parse(String),

    #[error("provider API error: {0}")]
    Api(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("rate limited: retry after {0:?}")]
    RateLimited(std::time::Duration),
}

/// Errors surfaced by the gateway's dispatch surface.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no providers registered or eligible for this task")]
    NoProvidersAvailable,

    #[error("all providers failed, last error: {0}")]
    AllProvidersFailed(ProviderError),

    #[error("no image-generation-capable provider registered")]
    NoImageProvider,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
