//! Storage trait abstractions consumed by the gateway, worker fabric, and
//! processing pipeline. Concrete backends live in
//! `signalbrief-repository-memory` and `signalbrief-repository-postgres`.

pub mod error;
pub mod key;
pub mod lock;
pub mod repository;
pub mod store;
pub mod testing;

pub use error::{RepositoryError, StateError};
pub use key::{KeyKind, StateKey};
pub use lock::{DistributedLock, LockGuard};
pub use repository::{
    ClusterRepository, EvidenceCacheRepository, EvidenceRepository, ItemRepository,
    LinkCacheRepository, QueueRepository, RawMessageRepository, SettingsRepository,
};
pub use store::{CasResult, StateStore};
