//! `PostgreSQL` implementations of the typed [`signalbrief_repository::repository`]
//! traits.
//!
//! `find_similar` has no `pgvector` dependency available in this stack, so
//! it fetches embeddings in the candidate window and scores them in
//! process — the same linear scan `signalbrief-repository-memory` uses,
//! just bounded by a row cap instead of an in-memory map's full size.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signalbrief_core::{
    ChannelId, ClusterId, ClusterSummary, EvidenceSource, Item, ItemId, ItemStatus, LinkStatus,
    LinkType, QueueItem, QueueItemId, QueueKind, QueueStatus, RawMessage, RawMessageId,
    ResolvedLink, ResolvedLinkId, Setting,
};
use signalbrief_repository::{
    ClusterRepository, EvidenceCacheRepository, EvidenceRepository, ItemRepository,
    LinkCacheRepository, QueueRepository, RawMessageRepository, RepositoryError,
    SettingsRepository,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::PostgresConfig;

type Result<T> = std::result::Result<T, RepositoryError>;

/// Candidate cap for the in-process `find_similar` scan.
const SIMILARITY_SCAN_LIMIT: i64 = 2000;

fn backend_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Backend(e.to_string())
}

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

fn item_status_str(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Pending => "pending",
        ItemStatus::Ready => "ready",
        ItemStatus::Duplicate => "duplicate",
        ItemStatus::Dropped => "dropped",
        ItemStatus::Error => "error",
    }
}

fn parse_item_status(s: &str) -> Result<ItemStatus> {
    match s {
        "pending" => Ok(ItemStatus::Pending),
        "ready" => Ok(ItemStatus::Ready),
        "duplicate" => Ok(ItemStatus::Duplicate),
        "dropped" => Ok(ItemStatus::Dropped),
        "error" => Ok(ItemStatus::Error),
        other => Err(RepositoryError::Backend(format!("unknown item status: {other}"))),
    }
}

fn queue_status_str(status: QueueStatus) -> &'static str {
    match status {
        QueueStatus::Pending => "pending",
        QueueStatus::Processing => "processing",
        QueueStatus::Done => "done",
        QueueStatus::Error => "error",
    }
}

fn parse_queue_status(s: &str) -> Result<QueueStatus> {
    match s {
        "pending" => Ok(QueueStatus::Pending),
        "processing" => Ok(QueueStatus::Processing),
        "done" => Ok(QueueStatus::Done),
        "error" => Ok(QueueStatus::Error),
        other => Err(RepositoryError::Backend(format!("unknown queue status: {other}"))),
    }
}

fn parse_queue_kind(s: &str) -> Result<QueueKind> {
    match s {
        "factcheck" => Ok(QueueKind::Factcheck),
        "enrichment" => Ok(QueueKind::Enrichment),
        "crawl" => Ok(QueueKind::Crawl),
        other => Err(RepositoryError::Backend(format!("unknown queue kind: {other}"))),
    }
}

fn link_type_str(link_type: LinkType) -> &'static str {
    match link_type {
        LinkType::Web => "web",
        LinkType::Telegram => "telegram",
        LinkType::Youtube => "youtube",
        LinkType::Blocked => "blocked",
    }
}

fn parse_link_type(s: &str) -> Result<LinkType> {
    match s {
        "web" => Ok(LinkType::Web),
        "telegram" => Ok(LinkType::Telegram),
        "youtube" => Ok(LinkType::Youtube),
        "blocked" => Ok(LinkType::Blocked),
        other => Err(RepositoryError::Backend(format!("unknown link type: {other}"))),
    }
}

fn link_status_str(status: LinkStatus) -> &'static str {
    match status {
        LinkStatus::Success => "success",
        LinkStatus::Failed => "failed",
        LinkStatus::Pending => "pending",
    }
}

fn parse_link_status(s: &str) -> Result<LinkStatus> {
    match s {
        "success" => Ok(LinkStatus::Success),
        "failed" => Ok(LinkStatus::Failed),
        "pending" => Ok(LinkStatus::Pending),
        other => Err(RepositoryError::Backend(format!("unknown link status: {other}"))),
    }
}

#[derive(sqlx::FromRow)]
struct RawMessageRow {
    id: Uuid,
    channel_id: String,
    channel_title: String,
    channel_context: String,
    tg_message_id: i64,
    tg_date: DateTime<Utc>,
    text: String,
    entities_json: Vec<u8>,
    media_json: Vec<u8>,
    media_data: Option<Vec<u8>>,
    canonical_hash: String,
    is_forward: bool,
    channel_relevance_threshold: f32,
    channel_importance_threshold: f32,
    created_at: DateTime<Utc>,
}

impl From<RawMessageRow> for RawMessage {
    fn from(row: RawMessageRow) -> Self {
        Self {
            id: RawMessageId::from(row.id),
            channel_id: ChannelId::from(row.channel_id),
            channel_title: row.channel_title,
            channel_context: row.channel_context,
            tg_message_id: row.tg_message_id,
            tg_date: row.tg_date,
            text: row.text,
            entities_json: row.entities_json,
            media_json: row.media_json,
            media_data: row.media_data,
            canonical_hash: row.canonical_hash,
            is_forward: row.is_forward,
            channel_relevance_threshold: row.channel_relevance_threshold,
            channel_importance_threshold: row.channel_importance_threshold,
            created_at: row.created_at,
        }
    }
}

/// `PostgreSQL`-backed [`RawMessageRepository`].
pub struct PostgresRawMessageRepository {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresRawMessageRepository {
    #[must_use]
    pub fn new(pool: PgPool, config: Arc<PostgresConfig>) -> Self {
        Self { pool, config }
    }
}

#[async_trait]
impl RawMessageRepository for PostgresRawMessageRepository {
    async fn create(&self, message: RawMessage) -> Result<()> {
        let table = self.config.raw_messages_table();
        let query = format!(
            "INSERT INTO {table} (
                id, channel_id, channel_title, channel_context, tg_message_id, tg_date, text,
                entities_json, media_json, media_data, canonical_hash, is_forward,
                channel_relevance_threshold, channel_importance_threshold, created_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)"
        );
        sqlx::query(&query)
            .bind(Uuid::from(message.id))
            .bind(message.channel_id.0)
            .bind(message.channel_title)
            .bind(message.channel_context)
            .bind(message.tg_message_id)
            .bind(message.tg_date)
            .bind(message.text)
            .bind(message.entities_json)
            .bind(message.media_json)
            .bind(message.media_data)
            .bind(message.canonical_hash)
            .bind(message.is_forward)
            .bind(message.channel_relevance_threshold)
            .bind(message.channel_importance_threshold)
            .bind(message.created_at)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn get(&self, id: RawMessageId) -> Result<Option<RawMessage>> {
        let table = self.config.raw_messages_table();
        let query = format!("SELECT * FROM {table} WHERE id = $1");
        let row: Option<RawMessageRow> = sqlx::query_as(&query)
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(row.map(Into::into))
    }

    async fn get_by_canonical_hash(
        &self,
        channel_id: &ChannelId,
        canonical_hash: &str,
    ) -> Result<Option<RawMessage>> {
        let table = self.config.raw_messages_table();
        let query = format!(
            "SELECT * FROM {table} WHERE channel_id = $1 AND canonical_hash = $2 LIMIT 1"
        );
        let row: Option<RawMessageRow> = sqlx::query_as(&query)
            .bind(&channel_id.0)
            .bind(canonical_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(row.map(Into::into))
    }

    async fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<RawMessage>> {
        let raw_table = self.config.raw_messages_table();
        let items_table = self.config.items_table();
        let query = format!(
            "SELECT r.* FROM {raw_table} r
             LEFT JOIN {items_table} i ON i.raw_message_id = r.id
             WHERE i.id IS NULL
             ORDER BY r.tg_date
             LIMIT $1"
        );
        let rows: Vec<RawMessageRow> = sqlx::query_as(&query)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    raw_message_id: Uuid,
    relevance_score: f32,
    importance_score: f32,
    topic: String,
    summary: String,
    language: String,
    status: String,
    error_json: Option<serde_json::Value>,
    duplicate_of: Option<Uuid>,
    drop_reason: Option<String>,
    embedding: Option<Vec<f32>>,
    tg_date: DateTime<Utc>,
    source_channel_id: String,
    source_channel_title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ItemRow {
    fn into_item(self) -> Result<Item> {
        Ok(Item {
            id: ItemId::from(self.id),
            raw_message_id: RawMessageId::from(self.raw_message_id),
            relevance_score: self.relevance_score,
            importance_score: self.importance_score,
            topic: self.topic,
            summary: self.summary,
            language: self.language,
            status: parse_item_status(&self.status)?,
            error_json: self.error_json,
            duplicate_of: self.duplicate_of.map(ItemId::from),
            drop_reason: self.drop_reason,
            embedding: self.embedding,
            tg_date: self.tg_date,
            source_channel_id: ChannelId::from(self.source_channel_id),
            source_channel_title: self.source_channel_title,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// `PostgreSQL`-backed [`ItemRepository`].
pub struct PostgresItemRepository {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresItemRepository {
    #[must_use]
    pub fn new(pool: PgPool, config: Arc<PostgresConfig>) -> Self {
        Self { pool, config }
    }
}

#[async_trait]
impl ItemRepository for PostgresItemRepository {
    async fn create(&self, item: Item) -> Result<()> {
        let table = self.config.items_table();
        let query = format!(
            "INSERT INTO {table} (
                id, raw_message_id, relevance_score, importance_score, topic, summary, language,
                status, error_json, duplicate_of, drop_reason, embedding, tg_date,
                source_channel_id, source_channel_title, created_at, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17)"
        );
        sqlx::query(&query)
            .bind(Uuid::from(item.id))
            .bind(Uuid::from(item.raw_message_id))
            .bind(item.relevance_score)
            .bind(item.importance_score)
            .bind(item.topic)
            .bind(item.summary)
            .bind(item.language)
            .bind(item_status_str(item.status))
            .bind(item.error_json)
            .bind(item.duplicate_of.map(Uuid::from))
            .bind(item.drop_reason)
            .bind(item.embedding)
            .bind(item.tg_date)
            .bind(item.source_channel_id.0)
            .bind(item.source_channel_title)
            .bind(item.created_at)
            .bind(item.updated_at)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn update(&self, item: &Item) -> Result<()> {
        let table = self.config.items_table();
        let query = format!(
            "UPDATE {table} SET
                relevance_score = $1, importance_score = $2, topic = $3, summary = $4,
                language = $5, status = $6, error_json = $7, duplicate_of = $8,
                drop_reason = $9, embedding = $10, updated_at = $11
             WHERE id = $12"
        );
        let result = sqlx::query(&query)
            .bind(item.relevance_score)
            .bind(item.importance_score)
            .bind(&item.topic)
            .bind(&item.summary)
            .bind(&item.language)
            .bind(item_status_str(item.status))
            .bind(&item.error_json)
            .bind(item.duplicate_of.map(Uuid::from))
            .bind(&item.drop_reason)
            .bind(&item.embedding)
            .bind(item.updated_at)
            .bind(Uuid::from(item.id))
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(item.id.to_string()));
        }
        Ok(())
    }

    async fn get(&self, id: ItemId) -> Result<Option<Item>> {
        let table = self.config.items_table();
        let query = format!("SELECT * FROM {table} WHERE id = $1");
        let row: Option<ItemRow> = sqlx::query_as(&query)
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        row.map(ItemRow::into_item).transpose()
    }

    async fn check_strict_duplicate(
        &self,
        channel_id: &ChannelId,
        canonical_hash: &str,
    ) -> Result<Option<ItemId>> {
        let items_table = self.config.items_table();
        let raw_table = self.config.raw_messages_table();
        let query = format!(
            "SELECT i.id FROM {items_table} i
             JOIN {raw_table} r ON r.id = i.raw_message_id
             WHERE r.channel_id = $1 AND r.canonical_hash = $2
             LIMIT 1"
        );
        let row: Option<(Uuid,)> = sqlx::query_as(&query)
            .bind(&channel_id.0)
            .bind(canonical_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(row.map(|(id,)| ItemId::from(id)))
    }

    async fn find_similar(
        &self,
        embedding: &[f32],
        threshold: f32,
        since: DateTime<Utc>,
    ) -> Result<Option<ItemId>> {
        let table = self.config.items_table();
        let query = format!(
            "SELECT id, embedding FROM {table}
             WHERE embedding IS NOT NULL AND created_at >= $1
             ORDER BY created_at DESC
             LIMIT $2"
        );
        let rows: Vec<(Uuid, Option<Vec<f32>>)> = sqlx::query_as(&query)
            .bind(since)
            .bind(SIMILARITY_SCAN_LIMIT)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?;

        Ok(rows
            .into_iter()
            .find(|(_, candidate)| {
                candidate
                    .as_deref()
                    .is_some_and(|c| cosine_similarity(c, embedding) >= threshold)
            })
            .map(|(id, _)| ItemId::from(id)))
    }

    async fn get_ready_items_for_research(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Item>> {
        let table = self.config.items_table();
        let query = format!(
            "SELECT * FROM {table}
             WHERE status = 'ready' AND tg_date >= $1 AND tg_date < $2
             ORDER BY tg_date
             LIMIT $3"
        );
        let rows: Vec<ItemRow> = sqlx::query_as(&query)
            .bind(since)
            .bind(until)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?;
        rows.into_iter().map(ItemRow::into_item).collect()
    }
}

/// `PostgreSQL`-backed [`QueueRepository`], using `SELECT ... FOR UPDATE
/// SKIP LOCKED` so concurrent workers never contend for the same row.
pub struct PostgresQueueRepository {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresQueueRepository {
    #[must_use]
    pub fn new(pool: PgPool, config: Arc<PostgresConfig>) -> Self {
        Self { pool, config }
    }
}

#[derive(sqlx::FromRow)]
struct QueueItemRow {
    id: Uuid,
    kind: String,
    payload_keys: serde_json::Value,
    status: String,
    attempt_count: i32,
    claimed_at: Option<DateTime<Utc>>,
    retry_at: Option<DateTime<Utc>>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl QueueItemRow {
    fn into_queue_item(self) -> Result<QueueItem> {
        let payload_keys: HashMap<String, serde_json::Value> =
            serde_json::from_value(self.payload_keys)
                .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        Ok(QueueItem {
            id: QueueItemId::from(self.id),
            kind: parse_queue_kind(&self.kind)?,
            payload_keys,
            status: parse_queue_status(&self.status)?,
            attempt_count: u32::try_from(self.attempt_count).unwrap_or(0),
            claimed_at: self.claimed_at,
            retry_at: self.retry_at,
            error: self.error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl QueueRepository for PostgresQueueRepository {
    async fn enqueue(&self, kind: QueueKind, mut item: QueueItem) -> Result<()> {
        item.kind = kind;
        let table = self.config.queue_items_table();
        let query = format!(
            "INSERT INTO {table} (
                id, kind, payload_keys, status, attempt_count, claimed_at, retry_at, error,
                created_at, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)"
        );
        let payload = serde_json::to_value(&item.payload_keys)
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        sqlx::query(&query)
            .bind(Uuid::from(item.id))
            .bind(item.kind.label())
            .bind(payload)
            .bind(queue_status_str(item.status))
            .bind(i32::try_from(item.attempt_count).unwrap_or(i32::MAX))
            .bind(item.claimed_at)
            .bind(item.retry_at)
            .bind(item.error)
            .bind(item.created_at)
            .bind(item.updated_at)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn claim_next(&self, kind: QueueKind) -> Result<Option<QueueItem>> {
        let table = self.config.queue_items_table();
        let query = format!(
            "UPDATE {table} q
             SET status = 'processing', attempt_count = attempt_count + 1,
                 claimed_at = NOW(), updated_at = NOW()
             FROM (
                 SELECT id FROM {table}
                 WHERE kind = $1 AND status = 'pending'
                   AND (retry_at IS NULL OR retry_at <= NOW())
                 ORDER BY created_at
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             ) claimed
             WHERE q.id = claimed.id
             RETURNING q.*"
        );
        let row: Option<QueueItemRow> = sqlx::query_as(&query)
            .bind(kind.label())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        row.map(QueueItemRow::into_queue_item).transpose()
    }

    async fn update_status(&self, item: &QueueItem) -> Result<()> {
        let table = self.config.queue_items_table();
        let query = format!(
            "UPDATE {table} SET
                status = $1, attempt_count = $2, claimed_at = $3, retry_at = $4, error = $5,
                updated_at = $6
             WHERE id = $7"
        );
        let result = sqlx::query(&query)
            .bind(queue_status_str(item.status))
            .bind(i32::try_from(item.attempt_count).unwrap_or(i32::MAX))
            .bind(item.claimed_at)
            .bind(item.retry_at)
            .bind(&item.error)
            .bind(item.updated_at)
            .bind(Uuid::from(item.id))
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(item.id.to_string()));
        }
        Ok(())
    }

    async fn recover_stuck(&self, kind: QueueKind, stuck_threshold: chrono::Duration) -> Result<u64> {
        let table = self.config.queue_items_table();
        let query = format!(
            "UPDATE {table}
             SET status = 'pending', claimed_at = NULL, retry_at = NULL, updated_at = NOW()
             WHERE kind = $1 AND status = 'processing'
               AND claimed_at < NOW() - ($2 * INTERVAL '1 second')"
        );
        let result = sqlx::query(&query)
            .bind(kind.label())
            .bind(stuck_threshold.num_seconds())
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct ResolvedLinkRow {
    id: Uuid,
    url: String,
    url_canonical: String,
    domain: String,
    link_type: String,
    title: Option<String>,
    content: Option<String>,
    author: Option<String>,
    published_at: Option<DateTime<Utc>>,
    language: Option<String>,
    word_count: Option<i32>,
    channel_id: Option<String>,
    channel_title: Option<String>,
    channel_message_id: Option<i64>,
    status: String,
    resolved_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl ResolvedLinkRow {
    fn into_resolved_link(self) -> Result<ResolvedLink> {
        Ok(ResolvedLink {
            id: ResolvedLinkId::from(self.id),
            url: self.url,
            url_canonical: self.url_canonical,
            domain: self.domain,
            link_type: parse_link_type(&self.link_type)?,
            title: self.title,
            content: self.content,
            author: self.author,
            published_at: self.published_at,
            language: self.language,
            word_count: self.word_count.map(|w| u32::try_from(w).unwrap_or(0)),
            channel_id: self.channel_id,
            channel_title: self.channel_title,
            channel_message_id: self.channel_message_id,
            status: parse_link_status(&self.status)?,
            resolved_at: self.resolved_at,
            expires_at: self.expires_at,
        })
    }
}

/// `PostgreSQL`-backed [`LinkCacheRepository`].
pub struct PostgresLinkCacheRepository {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresLinkCacheRepository {
    #[must_use]
    pub fn new(pool: PgPool, config: Arc<PostgresConfig>) -> Self {
        Self { pool, config }
    }
}

#[async_trait]
impl LinkCacheRepository for PostgresLinkCacheRepository {
    async fn get(&self, url_canonical: &str) -> Result<Option<ResolvedLink>> {
        let table = self.config.resolved_links_table();
        let query = format!("SELECT * FROM {table} WHERE url_canonical = $1");
        let row: Option<ResolvedLinkRow> = sqlx::query_as(&query)
            .bind(url_canonical)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        row.map(ResolvedLinkRow::into_resolved_link).transpose()
    }

    async fn save(&self, link: ResolvedLink) -> Result<()> {
        let table = self.config.resolved_links_table();
        let query = format!(
            "INSERT INTO {table} (
                id, url, url_canonical, domain, link_type, title, content, author,
                published_at, language, word_count, channel_id, channel_title,
                channel_message_id, status, resolved_at, expires_at
             ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17)
             ON CONFLICT (url_canonical) DO UPDATE SET
                title = EXCLUDED.title, content = EXCLUDED.content, author = EXCLUDED.author,
                published_at = EXCLUDED.published_at, language = EXCLUDED.language,
                word_count = EXCLUDED.word_count, status = EXCLUDED.status,
                resolved_at = EXCLUDED.resolved_at, expires_at = EXCLUDED.expires_at"
        );
        sqlx::query(&query)
            .bind(Uuid::from(link.id))
            .bind(link.url)
            .bind(link.url_canonical)
            .bind(link.domain)
            .bind(link_type_str(link.link_type))
            .bind(link.title)
            .bind(link.content)
            .bind(link.author)
            .bind(link.published_at)
            .bind(link.language)
            .bind(link.word_count.map(|w| i32::try_from(w).unwrap_or(i32::MAX)))
            .bind(link.channel_id)
            .bind(link.channel_title)
            .bind(link.channel_message_id)
            .bind(link_status_str(link.status))
            .bind(link.resolved_at)
            .bind(link.expires_at)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }
}

/// `PostgreSQL`-backed [`EvidenceCacheRepository`].
pub struct PostgresEvidenceCacheRepository {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresEvidenceCacheRepository {
    #[must_use]
    pub fn new(pool: PgPool, config: Arc<PostgresConfig>) -> Self {
        Self { pool, config }
    }
}

#[async_trait]
impl EvidenceCacheRepository for PostgresEvidenceCacheRepository {
    async fn get(&self, normalized_query: &str, provider: &str) -> Result<Option<String>> {
        let table = self.config.evidence_cache_table();
        let query = format!(
            "SELECT raw_response FROM {table}
             WHERE provider = $1 AND normalized_query = $2 AND expires_at > NOW()"
        );
        let row: Option<(String,)> = sqlx::query_as(&query)
            .bind(provider)
            .bind(normalized_query)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(row.map(|(v,)| v))
    }

    async fn save(
        &self,
        normalized_query: &str,
        provider: &str,
        raw_response: &str,
        ttl: chrono::Duration,
    ) -> Result<()> {
        let table = self.config.evidence_cache_table();
        let query = format!(
            "INSERT INTO {table} (provider, normalized_query, raw_response, expires_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (provider, normalized_query) DO UPDATE SET
                raw_response = EXCLUDED.raw_response, expires_at = EXCLUDED.expires_at"
        );
        sqlx::query(&query)
            .bind(provider)
            .bind(normalized_query)
            .bind(raw_response)
            .bind(Utc::now() + ttl)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let table = self.config.evidence_cache_table();
        let query = format!("DELETE FROM {table} WHERE expires_at <= NOW()");
        let result = sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct EvidenceSourceRow {
    id: Uuid,
    item_id: Uuid,
    url: String,
    domain: String,
    title: String,
    description: String,
    agreement_score: f32,
    is_contradiction: bool,
}

impl From<EvidenceSourceRow> for EvidenceSource {
    fn from(row: EvidenceSourceRow) -> Self {
        Self {
            id: row.id.into(),
            item_id: ItemId::from(row.item_id),
            url: row.url,
            domain: row.domain,
            title: row.title,
            description: row.description,
            agreement_score: row.agreement_score,
            is_contradiction: row.is_contradiction,
        }
    }
}

/// `PostgreSQL`-backed [`EvidenceRepository`]. `replace_for_item` runs in a
/// transaction so a re-bind never leaves a partial evidence set visible.
pub struct PostgresEvidenceRepository {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresEvidenceRepository {
    #[must_use]
    pub fn new(pool: PgPool, config: Arc<PostgresConfig>) -> Self {
        Self { pool, config }
    }
}

#[async_trait]
impl EvidenceRepository for PostgresEvidenceRepository {
    async fn replace_for_item(&self, item_id: ItemId, sources: Vec<EvidenceSource>) -> Result<()> {
        let table = self.config.evidence_table();
        let mut tx = self.pool.begin().await.map_err(backend_err)?;

        let delete = format!("DELETE FROM {table} WHERE item_id = $1");
        sqlx::query(&delete)
            .bind(Uuid::from(item_id))
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;

        let insert = format!(
            "INSERT INTO {table}
                (id, item_id, url, domain, title, description, agreement_score, is_contradiction)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8)"
        );
        for source in sources {
            sqlx::query(&insert)
                .bind(Uuid::from(source.id))
                .bind(Uuid::from(source.item_id))
                .bind(source.url)
                .bind(source.domain)
                .bind(source.title)
                .bind(source.description)
                .bind(source.agreement_score)
                .bind(source.is_contradiction)
                .execute(&mut *tx)
                .await
                .map_err(backend_err)?;
        }

        tx.commit().await.map_err(backend_err)?;
        Ok(())
    }

    async fn get_for_item(&self, item_id: ItemId) -> Result<Vec<EvidenceSource>> {
        let table = self.config.evidence_table();
        let query = format!("SELECT * FROM {table} WHERE item_id = $1");
        let rows: Vec<EvidenceSourceRow> = sqlx::query_as(&query)
            .bind(Uuid::from(item_id))
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(rows.into_iter().map(EvidenceSource::from).collect())
    }
}

#[derive(sqlx::FromRow)]
struct ClusterSummaryRow {
    id: Uuid,
    topic: String,
    summary: String,
    item_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<ClusterSummaryRow> for ClusterSummary {
    fn from(row: ClusterSummaryRow) -> Self {
        Self {
            id: row.id.into(),
            topic: row.topic,
            summary: row.summary,
            item_ids: row.item_ids.into_iter().map(ItemId::from).collect(),
            created_at: row.created_at,
        }
    }
}

/// `PostgreSQL`-backed [`ClusterRepository`]. `item_ids` is stored as a
/// `UUID[]` column rather than a join table, matching the arena-by-id
/// membership model on [`ClusterSummary`] itself.
pub struct PostgresClusterRepository {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresClusterRepository {
    #[must_use]
    pub fn new(pool: PgPool, config: Arc<PostgresConfig>) -> Self {
        Self { pool, config }
    }
}

#[async_trait]
impl ClusterRepository for PostgresClusterRepository {
    async fn create(&self, cluster: ClusterSummary) -> Result<()> {
        let table = self.config.clusters_table();
        let query = format!(
            "INSERT INTO {table} (id, topic, summary, item_ids, created_at) VALUES ($1,$2,$3,$4,$5)"
        );
        let item_ids: Vec<Uuid> = cluster.item_ids.into_iter().map(Uuid::from).collect();
        sqlx::query(&query)
            .bind(Uuid::from(cluster.id))
            .bind(cluster.topic)
            .bind(cluster.summary)
            .bind(item_ids)
            .bind(cluster.created_at)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn list_since(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<ClusterSummary>> {
        let table = self.config.clusters_table();
        let query =
            format!("SELECT * FROM {table} WHERE created_at >= $1 ORDER BY created_at LIMIT $2");
        let rows: Vec<ClusterSummaryRow> = sqlx::query_as(&query)
            .bind(since)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(rows.into_iter().map(ClusterSummary::from).collect())
    }
}

/// `PostgreSQL`-backed [`SettingsRepository`]. Each save is wrapped in a
/// transaction so the current value and its history entry never diverge.
pub struct PostgresSettingsRepository {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresSettingsRepository {
    #[must_use]
    pub fn new(pool: PgPool, config: Arc<PostgresConfig>) -> Self {
        Self { pool, config }
    }
}

#[async_trait]
impl SettingsRepository for PostgresSettingsRepository {
    async fn get_setting(&self, key: &str) -> Result<Option<Setting>> {
        let table = self.config.settings_table();
        let query = format!("SELECT key, value, updated_at, updated_by FROM {table} WHERE key = $1");
        let row: Option<(String, serde_json::Value, DateTime<Utc>, String)> = sqlx::query_as(&query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(row.map(|(key, value, updated_at, updated_by)| Setting {
            key,
            value,
            updated_at,
            updated_by,
        }))
    }

    async fn save_setting_with_history(
        &self,
        key: &str,
        value: serde_json::Value,
        user_id: &str,
    ) -> Result<()> {
        let settings_table = self.config.settings_table();
        let history_table = self.config.settings_history_table();
        let mut tx = self.pool.begin().await.map_err(backend_err)?;

        let upsert = format!(
            "INSERT INTO {settings_table} (key, value, updated_at, updated_by)
             VALUES ($1, $2, NOW(), $3)
             ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value, updated_at = EXCLUDED.updated_at, updated_by = EXCLUDED.updated_by"
        );
        sqlx::query(&upsert)
            .bind(key)
            .bind(&value)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;

        let history_insert = format!(
            "INSERT INTO {history_table} (key, value, changed_at, changed_by) VALUES ($1, $2, NOW(), $3)"
        );
        sqlx::query(&history_insert)
            .bind(key)
            .bind(&value)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;

        tx.commit().await.map_err(backend_err)?;
        Ok(())
    }
}
