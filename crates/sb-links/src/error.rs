use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("unparseable URL: {0}")]
    InvalidUrl(String),

    #[error("crawl index error: {0}")]
    Index(String),
}
