use signalbrief_repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),

    #[error("link seeding: {0}")]
    Link(#[from] signalbrief_links::LinkError),

    #[error("gateway: {0}")]
    Gateway(#[from] signalbrief_llm::GatewayError),
}
