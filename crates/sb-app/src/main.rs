//! signalbrief: ingest, filter, deduplicate, cluster, and enrich Telegram
//! channel messages. One binary, one subcommand per operating mode.

mod config;
mod crawl_index;
mod enrichment_budget;
mod enrichment_factory;
mod error;
mod language_policy;
mod modes;
mod registry_factory;
mod state_factory;
mod telegram_resolver;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use signalbrief_worker::QueueWorkerConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use config::{EnrichmentArgs, HttpArgs, LlmArgs, PipelineArgs, StateArgs, WorkerArgs};
use error::AppError;

/// signalbrief: Telegram channel signal extraction pipeline.
#[derive(Parser, Debug)]
#[command(name = "signalbrief", about = "Telegram channel signal extraction pipeline")]
struct Cli {
    #[command(flatten)]
    state: StateArgs,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Ingest `RawMessage` NDJSON records from stdin.
    Reader,
    /// Run the pipeline, clustering, and enrichment background jobs.
    Worker {
        #[command(flatten)]
        llm: LlmArgs,
        #[command(flatten)]
        pipeline: PipelineArgs,
        #[command(flatten)]
        enrichment: EnrichmentArgs,
        #[command(flatten)]
        worker: WorkerArgs,
    },
    /// Read or write an operator setting.
    Bot {
        #[command(subcommand)]
        action: BotAction,
    },
    /// Print ready cluster summaries from the lookback window as NDJSON.
    Digest {
        #[arg(long, env = "DIGEST_LOOKBACK_HOURS", default_value_t = 24)]
        lookback_hours: i64,
        #[arg(long, env = "DIGEST_LIMIT", default_value_t = 50)]
        limit: usize,
    },
    /// Run the health-check HTTP server.
    Http {
        #[command(flatten)]
        http: HttpArgs,
    },
}

#[derive(Subcommand, Debug)]
enum BotAction {
    Get {
        key: String,
    },
    Set {
        key: String,
        value: String,
        #[arg(long, default_value = "cli")]
        user_id: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        error!(error = %err, "signalbrief exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let cancel = CancellationToken::new();

    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
            shutdown_cancel.cancel();
        }
    });

    match cli.mode {
        Mode::Reader => {
            let repositories = state_factory::create_repositories(&cli.state).await?;
            modes::reader::run(repositories.raw_messages).await
        }
        Mode::Worker { llm, pipeline, enrichment, worker } => {
            run_worker(&cli.state, llm, pipeline, enrichment, worker, cancel).await
        }
        Mode::Bot { action } => {
            let repositories = state_factory::create_repositories(&cli.state).await?;
            match action {
                BotAction::Get { key } => modes::bot::get(repositories.settings, key).await,
                BotAction::Set { key, value, user_id } => {
                    modes::bot::set(repositories.settings, key, value, user_id).await
                }
            }
        }
        Mode::Digest { lookback_hours, limit } => {
            let repositories = state_factory::create_repositories(&cli.state).await?;
            modes::digest::run(repositories.clusters, chrono::Duration::hours(lookback_hours), limit).await
        }
        Mode::Http { http } => {
            let (store, _lock) = state_factory::create_state(&cli.state).await?;
            modes::http::run(cancel, store, &http.http_host, http.http_port).await
        }
    }
}

async fn run_worker(
    state_args: &StateArgs,
    llm: LlmArgs,
    pipeline: PipelineArgs,
    enrichment: EnrichmentArgs,
    worker: WorkerArgs,
    cancel: CancellationToken,
) -> Result<(), AppError> {
    let repositories = state_factory::create_repositories(state_args).await?;
    let (store, lock) = state_factory::create_state(state_args).await?;

    let registry = Arc::new(registry_factory::build_registry(&llm, Arc::clone(&store), Arc::clone(&lock)).await?);

    let enrichment_engine = Arc::new(enrichment_factory::build_engine(
        &enrichment,
        &pipeline,
        Arc::clone(&registry),
        store,
        lock,
        Arc::clone(&repositories.evidence_cache),
        Arc::clone(&repositories.evidence),
    )?);

    let enrichment_budget = Arc::new(enrichment_budget::EnrichmentBudget::new(
        enrichment.enrichment_daily_limit,
        enrichment.enrichment_monthly_limit,
    ));

    let mut queue_config = QueueWorkerConfig::new(signalbrief_core::QueueKind::Enrichment);
    queue_config.poll_interval = Duration::from_secs(worker.worker_poll_interval_seconds);

    let deps = modes::worker::WorkerDeps {
        repositories,
        registry,
        pipeline_config: pipeline.to_pipeline_config(),
        cluster_config: signalbrief_pipeline::ClusterConfig::default(),
        enrichment_engine,
        enrichment_budget,
        poll_interval_seconds: worker.worker_poll_interval_seconds,
        cluster_sweep_interval_seconds: worker.cluster_sweep_interval_seconds,
        queue_config,
        poll_batch: worker.worker_poll_batch,
    };

    modes::worker::run(cancel, deps).await
}
