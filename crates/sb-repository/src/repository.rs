//! Typed domain repositories.
//!
//! Per DESIGN NOTES, these are modeled as one trait per coherent operation
//! group rather than one mega-interface, mirroring the relational-shaped
//! queries the pipeline and worker fabric actually issue. The flat
//! [`crate::store::StateStore`] above this module is a different, narrower
//! abstraction used only by the gateway's own bookkeeping.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signalbrief_core::{
    ChannelId, ClusterSummary, EvidenceSource, Item, ItemId, QueueItem, QueueItemId, QueueKind,
    RawMessage, RawMessageId, ResolvedLink, Setting,
};

use crate::error::RepositoryError;

type Result<T> = std::result::Result<T, RepositoryError>;

#[async_trait]
pub trait RawMessageRepository: Send + Sync {
    async fn create(&self, message: RawMessage) -> Result<()>;
    async fn get(&self, id: RawMessageId) -> Result<Option<RawMessage>>;
    async fn get_by_canonical_hash(
        &self,
        channel_id: &ChannelId,
        canonical_hash: &str,
    ) -> Result<Option<RawMessage>>;
    /// Raw messages with no corresponding Item yet, oldest `tg_date` first.
    async fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<RawMessage>>;
}

#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn create(&self, item: Item) -> Result<()>;
    async fn update(&self, item: &Item) -> Result<()>;
    async fn get(&self, id: ItemId) -> Result<Option<Item>>;

    /// Existing items in `channel_id` sharing `canonical_hash`, for strict
    /// dedup (stage 5).
    async fn check_strict_duplicate(
        &self,
        channel_id: &ChannelId,
        canonical_hash: &str,
    ) -> Result<Option<ItemId>>;

    /// Items within `since..now` whose embedding's cosine similarity to
    /// `embedding` exceeds `threshold`, for semantic dedup (stage 6).
    /// Returns at most one match — callers only need the first hit.
    async fn find_similar(
        &self,
        embedding: &[f32],
        threshold: f32,
        since: DateTime<Utc>,
    ) -> Result<Option<ItemId>>;

    /// Ready items in `since..until`, for the clustering sweep.
    async fn get_ready_items_for_research(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Item>>;
}

#[async_trait]
pub trait QueueRepository: Send + Sync {
    async fn enqueue(&self, kind: QueueKind, item: QueueItem) -> Result<()>;

    /// Atomically claim the next eligible row: `status = 'pending' AND
    /// (retry_at IS NULL OR retry_at <= now)`, mark it `processing`, bump
    /// `attempt_count`, stamp `claimed_at`.
    async fn claim_next(&self, kind: QueueKind) -> Result<Option<QueueItem>>;

    async fn update_status(&self, item: &QueueItem) -> Result<()>;

    /// Reset `processing` rows whose `claimed_at` predates
    /// `now - stuck_threshold` back to `pending`. Returns the count reset.
    async fn recover_stuck(
        &self,
        kind: QueueKind,
        stuck_threshold: chrono::Duration,
    ) -> Result<u64>;
}

#[async_trait]
pub trait LinkCacheRepository: Send + Sync {
    async fn get(&self, url_canonical: &str) -> Result<Option<ResolvedLink>>;
    async fn save(&self, link: ResolvedLink) -> Result<()>;
}

/// Raw evidence-provider responses, keyed by normalized query, separate
/// from the per-item [`signalbrief_core::EvidenceSource`] binding.
#[async_trait]
pub trait EvidenceCacheRepository: Send + Sync {
    async fn get(&self, normalized_query: &str, provider: &str) -> Result<Option<String>>;
    async fn save(
        &self,
        normalized_query: &str,
        provider: &str,
        raw_response: &str,
        ttl: chrono::Duration,
    ) -> Result<()>;
    /// Purge entries past their TTL. Returns the count purged.
    async fn purge_expired(&self) -> Result<u64>;
}

/// The per-item evidence table the enrichment engine's binding step
/// writes to, distinct from [`EvidenceCacheRepository`]'s raw provider
/// responses.
#[async_trait]
pub trait EvidenceRepository: Send + Sync {
    /// Replace all evidence rows for `item_id` with `sources` in one
    /// write, since binding always recomputes the full deduplicated set.
    async fn replace_for_item(&self, item_id: ItemId, sources: Vec<EvidenceSource>) -> Result<()>;
    async fn get_for_item(&self, item_id: ItemId) -> Result<Vec<EvidenceSource>>;
}

/// Cluster outputs from the periodic clustering sweep, read by the
/// external digest builder.
#[async_trait]
pub trait ClusterRepository: Send + Sync {
    async fn create(&self, cluster: ClusterSummary) -> Result<()>;
    async fn list_since(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<ClusterSummary>>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<Setting>>;
    async fn save_setting_with_history(
        &self,
        key: &str,
        value: serde_json::Value,
        user_id: &str,
    ) -> Result<()>;
}
