use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the flat [`crate::store::StateStore`] and
/// [`crate::lock::DistributedLock`] abstractions.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("lock not held")]
    LockNotHeld,

    #[error("lock expired: {0}")]
    LockExpired(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors surfaced by the typed domain [`crate::repository`] traits.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),
}
