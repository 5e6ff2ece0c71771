//! In-memory backend for `signalbrief-repository`'s `StateStore`,
//! `DistributedLock`, and typed repository traits.
//!
//! Intended for tests, local development, and the single-process deploy
//! path; nothing here survives a restart. `signalbrief-repository-postgres`
//! is the durable counterpart.

pub mod lock;
pub mod repository;
pub mod store;

pub use lock::{MemoryDistributedLock, MemoryLockGuard};
pub use repository::{
    MemoryClusterRepository, MemoryEvidenceCacheRepository, MemoryEvidenceRepository,
    MemoryItemRepository, MemoryLinkCacheRepository, MemoryQueueRepository,
    MemoryRawMessageRepository, MemorySettingsRepository,
};
pub use store::MemoryStateStore;
