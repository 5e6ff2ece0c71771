//! Worker mode: drives the three background jobs downstream of ingestion —
//! per-message pipeline processing (stages 1-6), the periodic clustering
//! sweep (stage 7), and the enrichment queue — on the three loop
//! primitives the worker fabric provides.

use std::sync::Arc;

use signalbrief_enrichment::{EnrichmentEngine, ItemEnrichmentContext};
use signalbrief_llm::Registry;
use signalbrief_pipeline::{ClusterConfig, PipelineConfig};
use signalbrief_repository::{ItemRepository, LinkCacheRepository, RawMessageRepository};
use signalbrief_worker::{PeriodicTask, QueueWorkerConfig, poll_loop, run_queue_worker, single_ticker_loop};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::enrichment_budget::EnrichmentBudget;
use crate::error::AppError;
use crate::state_factory::Repositories;
use crate::telegram_resolver::UnresolvedTelegramPeerResolver;

pub struct WorkerDeps {
    pub repositories: Repositories,
    pub registry: Arc<Registry>,
    pub pipeline_config: PipelineConfig,
    pub cluster_config: ClusterConfig,
    pub enrichment_engine: Arc<EnrichmentEngine>,
    pub enrichment_budget: Arc<EnrichmentBudget>,
    pub poll_interval_seconds: u64,
    pub cluster_sweep_interval_seconds: u64,
    pub queue_config: QueueWorkerConfig,
    pub poll_batch: usize,
}

pub async fn run(cancel: CancellationToken, deps: WorkerDeps) -> Result<(), AppError> {
    let telegram = Arc::new(UnresolvedTelegramPeerResolver);
    let crawl_index = Arc::new(
        crate::crawl_index::HttpCrawlIndex::new(deps.pipeline_config.seeding.search_index_url.clone())
            .map_err(|e| AppError::Config(format!("crawl index client: {e}")))?,
    );

    let raw_messages = Arc::clone(&deps.repositories.raw_messages);
    let items = Arc::clone(&deps.repositories.items);
    let link_cache = Arc::clone(&deps.repositories.link_cache);
    let queue = Arc::clone(&deps.repositories.queue);
    let registry = Arc::clone(&deps.registry);
    let pipeline_config = deps.pipeline_config.clone();
    let poll_batch = deps.poll_batch;

    let pipeline_cancel = cancel.clone();
    let pipeline_task = tokio::spawn(async move {
        poll_loop(
            pipeline_cancel,
            std::time::Duration::from_secs(deps.poll_interval_seconds),
            Vec::<PeriodicTask>::new(),
            move || {
                let raw_messages = Arc::clone(&raw_messages);
                let items = Arc::clone(&items);
                let link_cache = Arc::clone(&link_cache);
                let queue = Arc::clone(&queue);
                let registry = Arc::clone(&registry);
                let crawl_index = Arc::clone(&crawl_index);
                let telegram = Arc::clone(&telegram);
                let pipeline_config = pipeline_config.clone();
                async move {
                    let batch = raw_messages.fetch_unprocessed(poll_batch).await?;
                    if batch.is_empty() {
                        return Ok::<(), signalbrief_pipeline::PipelineError>(());
                    }
                    signalbrief_pipeline::process_raw_messages(
                        &registry,
                        items.as_ref(),
                        link_cache.as_ref(),
                        crawl_index.as_ref(),
                        telegram.as_ref(),
                        queue.as_ref(),
                        &pipeline_config,
                        &batch,
                    )
                    .await?;
                    Ok(())
                }
            },
            |err: &signalbrief_pipeline::PipelineError| {
                warn!(error = %err, "pipeline batch failed, continuing");
                true
            },
        )
        .await;
    });

    let cluster_items = Arc::clone(&deps.repositories.items);
    let cluster_clusters = Arc::clone(&deps.repositories.clusters);
    let cluster_registry = Arc::clone(&deps.registry);
    let cluster_config = deps.cluster_config.clone();
    let cluster_cancel = cancel.clone();
    let cluster_task = tokio::spawn(single_ticker_loop(
        cluster_cancel,
        std::time::Duration::from_secs(deps.cluster_sweep_interval_seconds),
        Box::new(move || {
            let items_repo = Arc::clone(&cluster_items);
            let clusters = Arc::clone(&cluster_clusters);
            let registry = Arc::clone(&cluster_registry);
            let config = cluster_config.clone();
            Box::pin(async move {
                let now = chrono::Utc::now();
                let since = now - config.lookback;
                match items_repo.get_ready_items_for_research(since, now, config.max_candidates).await {
                    Ok(items) if !items.is_empty() => {
                        if let Err(err) =
                            signalbrief_pipeline::run_cluster_sweep(&registry, clusters.as_ref(), &items, &config)
                                .await
                        {
                            warn!(error = %err, "cluster sweep failed");
                        }
                    }
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "failed to load ready items for cluster sweep"),
                }
            })
        }),
        None,
    ));

    let enrichment_queue = Arc::clone(&deps.repositories.queue);
    let enrichment_items = Arc::clone(&deps.repositories.items);
    let enrichment_raw_messages = Arc::clone(&deps.repositories.raw_messages);
    let enrichment_link_cache = Arc::clone(&deps.repositories.link_cache);
    let engine = Arc::clone(&deps.enrichment_engine);
    let budget = Arc::clone(&deps.enrichment_budget);
    let queue_config = deps.queue_config.clone();
    let queue_cancel = cancel.clone();
    let queue_task = tokio::spawn(run_queue_worker(
        queue_cancel,
        enrichment_queue,
        queue_config,
        move |queue_item| {
            let items = Arc::clone(&enrichment_items);
            let raw_messages = Arc::clone(&enrichment_raw_messages);
            let link_cache = Arc::clone(&enrichment_link_cache);
            let engine = Arc::clone(&engine);
            let budget = Arc::clone(&budget);
            async move { handle_enrichment_item(queue_item, items, raw_messages, link_cache, engine, budget).await }
        },
    ));

    let _ = tokio::join!(pipeline_task, cluster_task, queue_task);
    Ok(())
}

async fn handle_enrichment_item(
    queue_item: signalbrief_core::QueueItem,
    items: Arc<dyn ItemRepository>,
    raw_messages: Arc<dyn RawMessageRepository>,
    link_cache: Arc<dyn LinkCacheRepository>,
    engine: Arc<EnrichmentEngine>,
    budget: Arc<EnrichmentBudget>,
) -> Result<(), String> {
    let Some(item_id_value) = queue_item.payload_keys.get("item_id") else {
        return Err("enrichment queue row missing item_id".to_owned());
    };
    let item_id: signalbrief_core::ItemId =
        serde_json::from_value(item_id_value.clone()).map_err(|e| format!("bad item_id: {e}"))?;

    if !budget.try_consume().await {
        return Err("enrichment budget exhausted".to_owned());
    }

    let item = items
        .get(item_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "item not found".to_owned())?;

    let raw_message = raw_messages
        .get(item.raw_message_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "raw message not found".to_owned())?;

    let urls = signalbrief_pipeline::extract_message_urls(&raw_message);
    let resolved_link_titles = signalbrief_pipeline::lookup_resolved_titles(link_cache.as_ref(), &urls).await;

    let ctx = ItemEnrichmentContext {
        item: &item,
        channel_context: &raw_message.channel_context,
        full_text: &raw_message.text,
        resolved_link_titles: &resolved_link_titles,
    };

    engine.process_item(&ctx).await.map_err(|e| e.to_string())?;
    Ok(())
}
