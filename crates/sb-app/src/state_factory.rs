//! Construct the `StateStore`/`DistributedLock` pair and the eight typed
//! repositories from [`StateArgs`], selecting between the in-memory and
//! `PostgreSQL` backends.

use std::sync::Arc;

use signalbrief_repository::{
    ClusterRepository, DistributedLock, EvidenceCacheRepository, EvidenceRepository,
    ItemRepository, LinkCacheRepository, QueueRepository, RawMessageRepository,
    SettingsRepository, StateStore,
};
use signalbrief_repository_memory::{
    MemoryClusterRepository, MemoryDistributedLock, MemoryEvidenceCacheRepository,
    MemoryEvidenceRepository, MemoryItemRepository, MemoryLinkCacheRepository,
    MemoryQueueRepository, MemoryRawMessageRepository, MemorySettingsRepository, MemoryStateStore,
};
use signalbrief_repository_postgres::{
    PostgresClusterRepository, PostgresConfig, PostgresDistributedLock,
    PostgresEvidenceCacheRepository, PostgresEvidenceRepository, PostgresItemRepository,
    PostgresLinkCacheRepository, PostgresQueueRepository, PostgresRawMessageRepository,
    PostgresSettingsRepository, PostgresStateStore,
};

use crate::config::StateArgs;
use crate::error::AppError;

pub type StatePair = (Arc<dyn StateStore>, Arc<dyn DistributedLock>);

/// The eight typed repositories wired to one backend, bundled for the
/// modes that need more than one of them.
pub struct Repositories {
    pub raw_messages: Arc<dyn RawMessageRepository>,
    pub items: Arc<dyn ItemRepository>,
    pub queue: Arc<dyn QueueRepository>,
    pub link_cache: Arc<dyn LinkCacheRepository>,
    pub evidence_cache: Arc<dyn EvidenceCacheRepository>,
    pub evidence: Arc<dyn EvidenceRepository>,
    pub clusters: Arc<dyn ClusterRepository>,
    pub settings: Arc<dyn SettingsRepository>,
}

pub async fn create_state(args: &StateArgs) -> Result<StatePair, AppError> {
    match args.state_backend.as_str() {
        "memory" => Ok(create_memory_state()),
        "postgres" => create_postgres_state(args).await,
        other => Err(AppError::Config(format!("unsupported state backend: {other}"))),
    }
}

fn create_memory_state() -> StatePair {
    let store = Arc::new(MemoryStateStore::new());
    let lock = Arc::new(MemoryDistributedLock::new());
    (store, lock)
}

async fn create_postgres_state(args: &StateArgs) -> Result<StatePair, AppError> {
    let config = postgres_config(args)?;
    let store = Arc::new(
        PostgresStateStore::new(config.clone())
            .await
            .map_err(|e| AppError::Config(format!("postgres store: {e}")))?,
    );
    let lock = Arc::new(
        PostgresDistributedLock::new(config)
            .await
            .map_err(|e| AppError::Config(format!("postgres lock: {e}")))?,
    );
    Ok((store, lock))
}

pub async fn create_repositories(args: &StateArgs) -> Result<Repositories, AppError> {
    match args.state_backend.as_str() {
        "memory" => Ok(create_memory_repositories()),
        "postgres" => create_postgres_repositories(args).await,
        other => Err(AppError::Config(format!("unsupported state backend: {other}"))),
    }
}

fn create_memory_repositories() -> Repositories {
    let raw_messages = Arc::new(MemoryRawMessageRepository::new());
    let items = Arc::new(MemoryItemRepository::new(Arc::clone(&raw_messages)));
    Repositories {
        raw_messages,
        items,
        queue: Arc::new(MemoryQueueRepository::new()),
        link_cache: Arc::new(MemoryLinkCacheRepository::new()),
        evidence_cache: Arc::new(MemoryEvidenceCacheRepository::new()),
        evidence: Arc::new(MemoryEvidenceRepository::new()),
        clusters: Arc::new(MemoryClusterRepository::new()),
        settings: Arc::new(MemorySettingsRepository::new()),
    }
}

async fn create_postgres_repositories(args: &StateArgs) -> Result<Repositories, AppError> {
    let pg_config = postgres_config(args)?;
    // Reuse one pool (and its migrations run) across the state store and
    // every typed repository, rather than one pool per collaborator.
    let store = PostgresStateStore::new(pg_config.clone())
        .await
        .map_err(|e| AppError::Config(format!("postgres pool: {e}")))?;
    let pool = store.pool();
    let config = Arc::new(pg_config);

    Ok(Repositories {
        raw_messages: Arc::new(PostgresRawMessageRepository::new(pool.clone(), Arc::clone(&config))),
        items: Arc::new(PostgresItemRepository::new(pool.clone(), Arc::clone(&config))),
        queue: Arc::new(PostgresQueueRepository::new(pool.clone(), Arc::clone(&config))),
        link_cache: Arc::new(PostgresLinkCacheRepository::new(pool.clone(), Arc::clone(&config))),
        evidence_cache: Arc::new(PostgresEvidenceCacheRepository::new(pool.clone(), Arc::clone(&config))),
        evidence: Arc::new(PostgresEvidenceRepository::new(pool.clone(), Arc::clone(&config))),
        clusters: Arc::new(PostgresClusterRepository::new(pool.clone(), Arc::clone(&config))),
        settings: Arc::new(PostgresSettingsRepository::new(pool, config)),
    })
}

fn postgres_config(args: &StateArgs) -> Result<PostgresConfig, AppError> {
    let url = args
        .database_url
        .clone()
        .ok_or_else(|| AppError::Config("postgres backend requires --database-url".into()))?;
    Ok(PostgresConfig {
        url,
        pool_size: args.database_pool_size,
        table_prefix: args.database_table_prefix.clone(),
        ..PostgresConfig::default()
    })
}
