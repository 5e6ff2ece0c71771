use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use signalbrief_core::{
    ChannelId, ClusterSummary, EvidenceSource, Item, ItemId, QueueItem, QueueItemId, QueueKind,
    RawMessage, RawMessageId, ResolvedLink, Setting, SettingHistoryEntry,
};
use signalbrief_repository::{
    ClusterRepository, EvidenceCacheRepository, EvidenceRepository, ItemRepository,
    LinkCacheRepository, QueueRepository, RawMessageRepository, RepositoryError,
    SettingsRepository,
};

type Result<T> = std::result::Result<T, RepositoryError>;

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0_f32;
    let mut mag_a = 0.0_f32;
    let mut mag_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }
    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}

/// In-memory [`RawMessageRepository`], keyed by id with a secondary
/// `(channel_id, canonical_hash)` index for strict-dedup lookups.
#[derive(Default)]
pub struct MemoryRawMessageRepository {
    rows: DashMap<RawMessageId, RawMessage>,
}

impl MemoryRawMessageRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RawMessageRepository for MemoryRawMessageRepository {
    async fn create(&self, message: RawMessage) -> Result<()> {
        self.rows.insert(message.id, message);
        Ok(())
    }

    async fn get(&self, id: RawMessageId) -> Result<Option<RawMessage>> {
        Ok(self.rows.get(&id).map(|r| r.clone()))
    }

    async fn get_by_canonical_hash(
        &self,
        channel_id: &ChannelId,
        canonical_hash: &str,
    ) -> Result<Option<RawMessage>> {
        Ok(self
            .rows
            .iter()
            .map(|r| r.clone())
            .find(|m| &m.channel_id == channel_id && m.canonical_hash == canonical_hash))
    }

    async fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<RawMessage>> {
        let mut rows: Vec<RawMessage> = self.rows.iter().map(|r| r.clone()).collect();
        rows.sort_by_key(|m| m.tg_date);
        rows.truncate(limit);
        Ok(rows)
    }
}

/// In-memory [`ItemRepository`]. `find_similar` is a linear scan, adequate
/// for tests and single-process deployments but not meant to model a
/// production vector search.
///
/// Holds a handle to the sibling [`MemoryRawMessageRepository`] because
/// `check_strict_duplicate` keys off the source message's canonical hash,
/// which a SQL backend would resolve with a join against `raw_messages`.
pub struct MemoryItemRepository {
    rows: DashMap<ItemId, Item>,
    raw_messages: Arc<MemoryRawMessageRepository>,
}

impl MemoryItemRepository {
    #[must_use]
    pub fn new(raw_messages: Arc<MemoryRawMessageRepository>) -> Self {
        Self {
            rows: DashMap::new(),
            raw_messages,
        }
    }
}

#[async_trait]
impl ItemRepository for MemoryItemRepository {
    async fn create(&self, item: Item) -> Result<()> {
        self.rows.insert(item.id, item);
        Ok(())
    }

    async fn update(&self, item: &Item) -> Result<()> {
        if self.rows.contains_key(&item.id) {
            self.rows.insert(item.id, item.clone());
            Ok(())
        } else {
            Err(RepositoryError::NotFound(item.id.to_string()))
        }
    }

    async fn get(&self, id: ItemId) -> Result<Option<Item>> {
        Ok(self.rows.get(&id).map(|r| r.clone()))
    }

    async fn check_strict_duplicate(
        &self,
        channel_id: &ChannelId,
        canonical_hash: &str,
    ) -> Result<Option<ItemId>> {
        let Some(existing_message) = self
            .raw_messages
            .get_by_canonical_hash(channel_id, canonical_hash)
            .await?
        else {
            return Ok(None);
        };
        Ok(self
            .rows
            .iter()
            .find(|r| r.raw_message_id == existing_message.id)
            .map(|r| r.id))
    }

    async fn find_similar(
        &self,
        embedding: &[f32],
        threshold: f32,
        since: DateTime<Utc>,
    ) -> Result<Option<ItemId>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.created_at >= since)
            .find(|r| {
                r.embedding
                    .as_deref()
                    .is_some_and(|e| cosine_similarity(e, embedding) >= threshold)
            })
            .map(|r| r.id))
    }

    async fn get_ready_items_for_research(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Item>> {
        let mut rows: Vec<Item> = self
            .rows
            .iter()
            .filter(|r| {
                r.status == signalbrief_core::ItemStatus::Ready
                    && r.tg_date >= since
                    && r.tg_date < until
            })
            .map(|r| r.clone())
            .collect();
        rows.sort_by_key(|i| i.tg_date);
        rows.truncate(limit);
        Ok(rows)
    }
}

/// In-memory [`QueueRepository`]. `claim_next` picks the oldest eligible
/// row per kind; concurrent claims are serialized by `DashMap`'s per-shard
/// locking so at most one caller ever claims a given row.
#[derive(Default)]
pub struct MemoryQueueRepository {
    rows: DashMap<QueueItemId, QueueItem>,
}

impl MemoryQueueRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueRepository for MemoryQueueRepository {
    async fn enqueue(&self, kind: QueueKind, mut item: QueueItem) -> Result<()> {
        item.kind = kind;
        self.rows.insert(item.id, item);
        Ok(())
    }

    async fn claim_next(&self, kind: QueueKind) -> Result<Option<QueueItem>> {
        let now = Utc::now();
        let mut candidate_id = None;
        let mut candidate_created_at = None;

        for row in &self.rows {
            let item = row.value();
            if item.kind != kind || item.status != signalbrief_core::QueueStatus::Pending {
                continue;
            }
            if item.retry_at.is_some_and(|at| at > now) {
                continue;
            }
            if candidate_created_at.is_none_or(|created_at| item.created_at < created_at) {
                candidate_id = Some(item.id);
                candidate_created_at = Some(item.created_at);
            }
        }

        let Some(id) = candidate_id else {
            return Ok(None);
        };

        let mut entry = self
            .rows
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        entry.status = signalbrief_core::QueueStatus::Processing;
        entry.attempt_count += 1;
        entry.claimed_at = Some(now);
        entry.updated_at = now;
        Ok(Some(entry.clone()))
    }

    async fn update_status(&self, item: &QueueItem) -> Result<()> {
        if self.rows.contains_key(&item.id) {
            self.rows.insert(item.id, item.clone());
            Ok(())
        } else {
            Err(RepositoryError::NotFound(item.id.to_string()))
        }
    }

    async fn recover_stuck(&self, kind: QueueKind, stuck_threshold: chrono::Duration) -> Result<u64> {
        let now = Utc::now();
        let mut recovered = 0u64;
        for mut row in self.rows.iter_mut() {
            let item = row.value_mut();
            if item.kind == kind && item.is_stuck(now, stuck_threshold) {
                item.recover();
                recovered += 1;
            }
        }
        Ok(recovered)
    }
}

/// In-memory [`LinkCacheRepository`], keyed by canonical URL.
#[derive(Default)]
pub struct MemoryLinkCacheRepository {
    rows: DashMap<String, ResolvedLink>,
}

impl MemoryLinkCacheRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LinkCacheRepository for MemoryLinkCacheRepository {
    async fn get(&self, url_canonical: &str) -> Result<Option<ResolvedLink>> {
        Ok(self.rows.get(url_canonical).map(|r| r.clone()))
    }

    async fn save(&self, link: ResolvedLink) -> Result<()> {
        self.rows.insert(link.url_canonical.clone(), link);
        Ok(())
    }
}

struct EvidenceCacheRow {
    raw_response: String,
    expires_at: DateTime<Utc>,
}

/// In-memory [`EvidenceCacheRepository`], keyed by `(provider, query)`.
#[derive(Default)]
pub struct MemoryEvidenceCacheRepository {
    rows: DashMap<(String, String), EvidenceCacheRow>,
}

impl MemoryEvidenceCacheRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EvidenceCacheRepository for MemoryEvidenceCacheRepository {
    async fn get(&self, normalized_query: &str, provider: &str) -> Result<Option<String>> {
        let key = (provider.to_owned(), normalized_query.to_owned());
        Ok(self.rows.get(&key).and_then(|row| {
            (row.expires_at > Utc::now()).then(|| row.raw_response.clone())
        }))
    }

    async fn save(
        &self,
        normalized_query: &str,
        provider: &str,
        raw_response: &str,
        ttl: chrono::Duration,
    ) -> Result<()> {
        self.rows.insert(
            (provider.to_owned(), normalized_query.to_owned()),
            EvidenceCacheRow {
                raw_response: raw_response.to_owned(),
                expires_at: Utc::now() + ttl,
            },
        );
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let before = self.rows.len();
        self.rows.retain(|_, row| row.expires_at > now);
        Ok((before - self.rows.len()) as u64)
    }
}

/// In-memory [`EvidenceRepository`], keyed by item.
#[derive(Default)]
pub struct MemoryEvidenceRepository {
    rows: DashMap<ItemId, Vec<EvidenceSource>>,
}

impl MemoryEvidenceRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EvidenceRepository for MemoryEvidenceRepository {
    async fn replace_for_item(&self, item_id: ItemId, sources: Vec<EvidenceSource>) -> Result<()> {
        self.rows.insert(item_id, sources);
        Ok(())
    }

    async fn get_for_item(&self, item_id: ItemId) -> Result<Vec<EvidenceSource>> {
        Ok(self.rows.get(&item_id).map(|r| r.clone()).unwrap_or_default())
    }
}

/// In-memory [`ClusterRepository`], stored in a `Mutex<Vec>` since
/// `list_since` needs a stable creation order.
#[derive(Default)]
pub struct MemoryClusterRepository {
    rows: Mutex<Vec<ClusterSummary>>,
}

impl MemoryClusterRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClusterRepository for MemoryClusterRepository {
    async fn create(&self, cluster: ClusterSummary) -> Result<()> {
        self.rows.lock().unwrap().push(cluster);
        Ok(())
    }

    async fn list_since(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<ClusterSummary>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.created_at >= since)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// In-memory [`SettingsRepository`]. History is appended in a `Mutex<Vec>`
/// rather than `DashMap` since entries must stay ordered.
#[derive(Default)]
pub struct MemorySettingsRepository {
    rows: DashMap<String, Setting>,
    history: Mutex<Vec<SettingHistoryEntry>>,
}

impl MemorySettingsRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn history_for(&self, key: &str) -> Vec<SettingHistoryEntry> {
        self.history
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|e| e.key == key)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SettingsRepository for MemorySettingsRepository {
    async fn get_setting(&self, key: &str) -> Result<Option<Setting>> {
        Ok(self.rows.get(key).map(|r| r.clone()))
    }

    async fn save_setting_with_history(
        &self,
        key: &str,
        value: serde_json::Value,
        user_id: &str,
    ) -> Result<()> {
        let now = Utc::now();
        self.rows.insert(
            key.to_owned(),
            Setting {
                key: key.to_owned(),
                value: value.clone(),
                updated_at: now,
                updated_by: user_id.to_owned(),
            },
        );
        self.history
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(SettingHistoryEntry {
                key: key.to_owned(),
                value,
                changed_at: now,
                changed_by: user_id.to_owned(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalbrief_core::{ItemStatus, LinkStatus, LinkType, QueueStatus, ResolvedLinkId};

    fn raw_message(channel: &str, hash: &str) -> RawMessage {
        RawMessage {
            id: RawMessageId::new(),
            channel_id: ChannelId::from(channel),
            channel_title: "chan".into(),
            channel_context: String::new(),
            tg_message_id: 1,
            tg_date: Utc::now(),
            text: "hello".into(),
            entities_json: Vec::new(),
            media_json: Vec::new(),
            media_data: None,
            canonical_hash: hash.into(),
            is_forward: false,
            channel_relevance_threshold: 0.5,
            channel_importance_threshold: 0.5,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn raw_message_roundtrip_and_hash_lookup() {
        let repo = MemoryRawMessageRepository::new();
        let msg = raw_message("42", "hash-1");
        repo.create(msg.clone()).await.unwrap();

        let fetched = repo.get(msg.id).await.unwrap().unwrap();
        assert_eq!(fetched.canonical_hash, "hash-1");

        let by_hash = repo
            .get_by_canonical_hash(&ChannelId::from("42"), "hash-1")
            .await
            .unwrap();
        assert!(by_hash.is_some());
    }

    #[tokio::test]
    async fn fetch_unprocessed_orders_by_tg_date() {
        let repo = MemoryRawMessageRepository::new();
        let mut older = raw_message("1", "a");
        older.tg_date = Utc::now() - chrono::Duration::hours(2);
        let mut newer = raw_message("1", "b");
        newer.tg_date = Utc::now();
        repo.create(newer).await.unwrap();
        repo.create(older.clone()).await.unwrap();

        let rows = repo.fetch_unprocessed(10).await.unwrap();
        assert_eq!(rows[0].canonical_hash, older.canonical_hash);
    }

    #[tokio::test]
    async fn check_strict_duplicate_joins_through_raw_messages() {
        let raw_messages = Arc::new(MemoryRawMessageRepository::new());
        let msg = raw_message("7", "dup-hash");
        raw_messages.create(msg.clone()).await.unwrap();

        let repo = MemoryItemRepository::new(Arc::clone(&raw_messages));
        let item = Item::new_pending(msg.id, ChannelId::from("7"), "chan".into(), Utc::now());
        repo.create(item.clone()).await.unwrap();

        let found = repo
            .check_strict_duplicate(&ChannelId::from("7"), "dup-hash")
            .await
            .unwrap();
        assert_eq!(found, Some(item.id));

        let miss = repo
            .check_strict_duplicate(&ChannelId::from("7"), "other-hash")
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn item_find_similar_respects_threshold_and_window() {
        let repo = MemoryItemRepository::new(Arc::new(MemoryRawMessageRepository::new()));
        let mut item = Item::new_pending(RawMessageId::new(), ChannelId::from("1"), "c".into(), Utc::now());
        item.embedding = Some(vec![1.0, 0.0]);
        repo.create(item.clone()).await.unwrap();

        let since = Utc::now() - chrono::Duration::hours(1);
        let hit = repo.find_similar(&[1.0, 0.0], 0.9, since).await.unwrap();
        assert_eq!(hit, Some(item.id));

        let miss = repo.find_similar(&[0.0, 1.0], 0.9, since).await.unwrap();
        assert!(miss.is_none());

        let too_old = Utc::now() + chrono::Duration::hours(1);
        let miss_window = repo.find_similar(&[1.0, 0.0], 0.9, too_old).await.unwrap();
        assert!(miss_window.is_none());
    }

    #[tokio::test]
    async fn get_ready_items_filters_status_and_window() {
        let repo = MemoryItemRepository::new(Arc::new(MemoryRawMessageRepository::new()));
        let mut ready = Item::new_pending(RawMessageId::new(), ChannelId::from("1"), "c".into(), Utc::now());
        ready.status = ItemStatus::Ready;
        repo.create(ready.clone()).await.unwrap();

        let pending = Item::new_pending(RawMessageId::new(), ChannelId::from("1"), "c".into(), Utc::now());
        repo.create(pending).await.unwrap();

        let since = Utc::now() - chrono::Duration::hours(1);
        let until = Utc::now() + chrono::Duration::hours(1);
        let rows = repo.get_ready_items_for_research(since, until, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, ready.id);
    }

    #[tokio::test]
    async fn queue_claim_marks_processing_and_bumps_attempt() {
        let repo = MemoryQueueRepository::new();
        let item = QueueItem::new_pending(QueueKind::Enrichment, std::collections::HashMap::new());
        repo.enqueue(QueueKind::Enrichment, item.clone()).await.unwrap();

        let claimed = repo.claim_next(QueueKind::Enrichment).await.unwrap().unwrap();
        assert_eq!(claimed.status, QueueStatus::Processing);
        assert_eq!(claimed.attempt_count, 1);
        assert!(claimed.claimed_at.is_some());

        let none_left = repo.claim_next(QueueKind::Enrichment).await.unwrap();
        assert!(none_left.is_none());
    }

    #[tokio::test]
    async fn queue_recover_stuck_resets_old_processing_rows() {
        let repo = MemoryQueueRepository::new();
        let mut item = QueueItem::new_pending(QueueKind::Crawl, std::collections::HashMap::new());
        item.status = QueueStatus::Processing;
        item.claimed_at = Some(Utc::now() - chrono::Duration::seconds(300));
        repo.enqueue(QueueKind::Crawl, item).await.unwrap();

        let recovered = repo
            .recover_stuck(QueueKind::Crawl, chrono::Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(recovered, 1);
    }

    #[tokio::test]
    async fn link_cache_roundtrip() {
        let repo = MemoryLinkCacheRepository::new();
        let link = ResolvedLink {
            id: ResolvedLinkId::new(),
            url: "https://example.com/a".into(),
            url_canonical: "https://example.com/a".into(),
            domain: "example.com".into(),
            link_type: LinkType::Web,
            title: None,
            content: None,
            author: None,
            published_at: None,
            language: None,
            word_count: None,
            channel_id: None,
            channel_title: None,
            channel_message_id: None,
            status: LinkStatus::Success,
            resolved_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        };
        repo.save(link.clone()).await.unwrap();
        let fetched = repo.get(&link.url_canonical).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn evidence_cache_expires() {
        let repo = MemoryEvidenceCacheRepository::new();
        repo.save("query", "provider-a", "{}", chrono::Duration::seconds(-1))
            .await
            .unwrap();
        let hit = repo.get("query", "provider-a").await.unwrap();
        assert!(hit.is_none(), "expired entry should not be returned");
    }

    #[tokio::test]
    async fn settings_roundtrip_with_history() {
        let repo = MemorySettingsRepository::new();
        repo.save_setting_with_history("domain_denylist", serde_json::json!(["a.com"]), "alice")
            .await
            .unwrap();
        repo.save_setting_with_history("domain_denylist", serde_json::json!(["a.com", "b.com"]), "bob")
            .await
            .unwrap();

        let current = repo.get_setting("domain_denylist").await.unwrap().unwrap();
        assert_eq!(current.updated_by, "bob");
        assert_eq!(repo.history_for("domain_denylist").len(), 2);
    }
}
