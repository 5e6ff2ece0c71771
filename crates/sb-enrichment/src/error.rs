use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("provider {0} unavailable")]
    ProviderUnavailable(String),

    #[error("provider {0} circuit open")]
    CircuitOpen(String),

    #[error("provider request failed: {0}")]
    Provider(String),

    #[error("translation failed: {0}")]
    Translation(String),

    #[error("cache error: {0}")]
    Cache(#[from] signalbrief_repository::RepositoryError),
}
