use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Run database migrations, creating required tables if they do not exist.
///
/// Creates the gateway's flat `state`/`locks` tables plus the domain tables
/// backing the typed repositories: `raw_messages`, `items`, `queue_items`,
/// `resolved_links`, `evidence_cache`, `evidence`, `clusters`, `settings`,
/// `settings_history`.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let state_table = config.state_table();
    let locks_table = config.locks_table();
    let raw_messages_table = config.raw_messages_table();
    let items_table = config.items_table();
    let queue_items_table = config.queue_items_table();
    let resolved_links_table = config.resolved_links_table();
    let evidence_cache_table = config.evidence_cache_table();
    let evidence_table = config.evidence_table();
    let clusters_table = config.clusters_table();
    let settings_table = config.settings_table();
    let settings_history_table = config.settings_history_table();

    let create_state = format!(
        "CREATE TABLE IF NOT EXISTS {state_table} (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            version BIGINT NOT NULL DEFAULT 1,
            expires_at TIMESTAMPTZ
        )"
    );

    let create_locks = format!(
        "CREATE TABLE IF NOT EXISTS {locks_table} (
            name TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL
        )"
    );

    let create_raw_messages = format!(
        "CREATE TABLE IF NOT EXISTS {raw_messages_table} (
            id UUID PRIMARY KEY,
            channel_id TEXT NOT NULL,
            channel_title TEXT NOT NULL,
            channel_context TEXT NOT NULL,
            tg_message_id BIGINT NOT NULL,
            tg_date TIMESTAMPTZ NOT NULL,
            text TEXT NOT NULL,
            entities_json BYTEA NOT NULL,
            media_json BYTEA NOT NULL,
            media_data BYTEA,
            canonical_hash TEXT NOT NULL,
            is_forward BOOLEAN NOT NULL,
            channel_relevance_threshold REAL NOT NULL,
            channel_importance_threshold REAL NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )"
    );

    let create_raw_messages_hash_idx = format!(
        "CREATE INDEX IF NOT EXISTS {}raw_messages_channel_hash_idx \
         ON {raw_messages_table} (channel_id, canonical_hash)",
        config.table_prefix
    );

    let create_raw_messages_unprocessed_idx = format!(
        "CREATE INDEX IF NOT EXISTS {}raw_messages_tg_date_idx ON {raw_messages_table} (tg_date)",
        config.table_prefix
    );

    let create_items = format!(
        "CREATE TABLE IF NOT EXISTS {items_table} (
            id UUID PRIMARY KEY,
            raw_message_id UUID NOT NULL,
            relevance_score REAL NOT NULL,
            importance_score REAL NOT NULL,
            topic TEXT NOT NULL,
            summary TEXT NOT NULL,
            language TEXT NOT NULL,
            status TEXT NOT NULL,
            error_json JSONB,
            duplicate_of UUID,
            drop_reason TEXT,
            embedding REAL[],
            tg_date TIMESTAMPTZ NOT NULL,
            source_channel_id TEXT NOT NULL,
            source_channel_title TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )"
    );

    let create_items_ready_idx = format!(
        "CREATE INDEX IF NOT EXISTS {}items_status_tg_date_idx ON {items_table} (status, tg_date)",
        config.table_prefix
    );

    let create_items_raw_message_idx = format!(
        "CREATE INDEX IF NOT EXISTS {}items_raw_message_idx ON {items_table} (raw_message_id)",
        config.table_prefix
    );

    let create_queue_items = format!(
        "CREATE TABLE IF NOT EXISTS {queue_items_table} (
            id UUID PRIMARY KEY,
            kind TEXT NOT NULL,
            payload_keys JSONB NOT NULL,
            status TEXT NOT NULL,
            attempt_count INTEGER NOT NULL DEFAULT 0,
            claimed_at TIMESTAMPTZ,
            retry_at TIMESTAMPTZ,
            error TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )"
    );

    let create_queue_items_claim_idx = format!(
        "CREATE INDEX IF NOT EXISTS {}queue_items_claim_idx \
         ON {queue_items_table} (kind, status, retry_at, created_at)",
        config.table_prefix
    );

    let create_resolved_links = format!(
        "CREATE TABLE IF NOT EXISTS {resolved_links_table} (
            id UUID PRIMARY KEY,
            url TEXT NOT NULL,
            url_canonical TEXT NOT NULL UNIQUE,
            domain TEXT NOT NULL,
            link_type TEXT NOT NULL,
            title TEXT,
            content TEXT,
            author TEXT,
            published_at TIMESTAMPTZ,
            language TEXT,
            word_count INTEGER,
            channel_id TEXT,
            channel_title TEXT,
            channel_message_id BIGINT,
            status TEXT NOT NULL,
            resolved_at TIMESTAMPTZ NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL
        )"
    );

    let create_evidence_cache = format!(
        "CREATE TABLE IF NOT EXISTS {evidence_cache_table} (
            provider TEXT NOT NULL,
            normalized_query TEXT NOT NULL,
            raw_response TEXT NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (provider, normalized_query)
        )"
    );

    let create_evidence_cache_expiry_idx = format!(
        "CREATE INDEX IF NOT EXISTS {}evidence_cache_expiry_idx ON {evidence_cache_table} (expires_at)",
        config.table_prefix
    );

    let create_evidence = format!(
        "CREATE TABLE IF NOT EXISTS {evidence_table} (
            id UUID PRIMARY KEY,
            item_id UUID NOT NULL,
            url TEXT NOT NULL,
            domain TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            agreement_score REAL NOT NULL,
            is_contradiction BOOLEAN NOT NULL
        )"
    );

    let create_evidence_item_idx = format!(
        "CREATE INDEX IF NOT EXISTS {}evidence_item_idx ON {evidence_table} (item_id)",
        config.table_prefix
    );

    let create_clusters = format!(
        "CREATE TABLE IF NOT EXISTS {clusters_table} (
            id UUID PRIMARY KEY,
            topic TEXT NOT NULL,
            summary TEXT NOT NULL,
            item_ids UUID[] NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )"
    );

    let create_clusters_created_idx = format!(
        "CREATE INDEX IF NOT EXISTS {}clusters_created_idx ON {clusters_table} (created_at)",
        config.table_prefix
    );

    let create_settings = format!(
        "CREATE TABLE IF NOT EXISTS {settings_table} (
            key TEXT PRIMARY KEY,
            value JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            updated_by TEXT NOT NULL
        )"
    );

    let create_settings_history = format!(
        "CREATE TABLE IF NOT EXISTS {settings_history_table} (
            id BIGSERIAL PRIMARY KEY,
            key TEXT NOT NULL,
            value JSONB NOT NULL,
            changed_at TIMESTAMPTZ NOT NULL,
            changed_by TEXT NOT NULL
        )"
    );

    sqlx::query(&create_state).execute(pool).await?;
    sqlx::query(&create_locks).execute(pool).await?;
    sqlx::query(&create_raw_messages).execute(pool).await?;
    sqlx::query(&create_raw_messages_hash_idx).execute(pool).await?;
    sqlx::query(&create_raw_messages_unprocessed_idx)
        .execute(pool)
        .await?;
    sqlx::query(&create_items).execute(pool).await?;
    sqlx::query(&create_items_ready_idx).execute(pool).await?;
    sqlx::query(&create_items_raw_message_idx).execute(pool).await?;
    sqlx::query(&create_queue_items).execute(pool).await?;
    sqlx::query(&create_queue_items_claim_idx).execute(pool).await?;
    sqlx::query(&create_resolved_links).execute(pool).await?;
    sqlx::query(&create_evidence_cache).execute(pool).await?;
    sqlx::query(&create_evidence_cache_expiry_idx)
        .execute(pool)
        .await?;
    sqlx::query(&create_evidence).execute(pool).await?;
    sqlx::query(&create_evidence_item_idx).execute(pool).await?;
    sqlx::query(&create_clusters).execute(pool).await?;
    sqlx::query(&create_clusters_created_idx).execute(pool).await?;
    sqlx::query(&create_settings).execute(pool).await?;
    sqlx::query(&create_settings_history).execute(pool).await?;

    Ok(())
}
