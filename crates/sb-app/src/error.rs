use thiserror::Error;

/// Errors that can occur while constructing or running a mode.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("repository: {0}")]
    Repository(#[from] signalbrief_repository::RepositoryError),

    #[error("gateway: {0}")]
    Gateway(#[from] signalbrief_llm::GatewayError),

    #[error("pipeline: {0}")]
    Pipeline(#[from] signalbrief_pipeline::PipelineError),

    #[error("enrichment: {0}")]
    Enrichment(#[from] signalbrief_enrichment::EnrichmentError),
}
