//! `PostgreSQL` backend for `signalbrief-repository`'s `StateStore`,
//! `DistributedLock`, and typed repository traits.
//!
//! `signalbrief-repository-memory` is the in-process counterpart used for
//! tests and local development.

pub mod config;
pub mod lock;
pub mod migrations;
pub mod repository;
pub mod store;

pub use config::PostgresConfig;
pub use lock::{PostgresDistributedLock, PostgresLockGuard};
pub use repository::{
    PostgresClusterRepository, PostgresEvidenceCacheRepository, PostgresEvidenceRepository,
    PostgresItemRepository, PostgresLinkCacheRepository, PostgresQueueRepository,
    PostgresRawMessageRepository, PostgresSettingsRepository,
};
pub use store::PostgresStateStore;
