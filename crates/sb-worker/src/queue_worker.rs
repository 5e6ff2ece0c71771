//! The queue claim/retry pattern wired to [`QueueRepository`]: claim a
//! row, run the caller's handler, transition the row on completion or
//! failure, and periodically sweep rows stuck in `processing`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use signalbrief_core::{QueueItem, QueueKind};
use signalbrief_repository::QueueRepository;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::guard::run_guarded;

#[derive(Debug, Clone)]
pub struct QueueWorkerConfig {
    pub kind: QueueKind,
    /// How long to sleep after an empty claim before polling again.
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub retry_delay: chrono::Duration,
    /// The per-item timeout passed to the recovery sweep; a `processing`
    /// row claimed more than 2x this long ago is considered abandoned
    /// (see [`QueueItem::is_stuck`]).
    pub stuck_threshold: chrono::Duration,
    /// How often the recovery sweep runs.
    pub recovery_interval: Duration,
}

impl QueueWorkerConfig {
    #[must_use]
    pub fn new(kind: QueueKind) -> Self {
        Self {
            kind,
            poll_interval: Duration::from_secs(2),
            max_attempts: 5,
            retry_delay: chrono::Duration::seconds(30),
            stuck_threshold: chrono::Duration::minutes(10),
            recovery_interval: Duration::from_secs(300),
        }
    }
}

/// Run the queue worker loop until `cancel` fires. `handle` is called
/// with each claimed row's payload and returns `Ok(())` on success or
/// `Err(message)` to trigger the retry/terminal-error path.
pub async fn run_queue_worker<H, Fut>(
    cancel: CancellationToken,
    repository: Arc<dyn QueueRepository>,
    config: QueueWorkerConfig,
    mut handle: H,
) where
    H: FnMut(QueueItem) -> Fut,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    let mut recovery_last_run: Option<chrono::DateTime<Utc>> = None;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let now = Utc::now();
        let recovery_due = recovery_last_run.is_none_or(|last| {
            chrono::Duration::from_std(config.recovery_interval)
                .is_ok_and(|interval| now - last >= interval)
        });
        if recovery_due {
            match repository
                .recover_stuck(config.kind, config.stuck_threshold)
                .await
            {
                Ok(0) => {}
                Ok(n) => info!(kind = config.kind.label(), recovered = n, "recovered stuck queue rows"),
                Err(err) => warn!(kind = config.kind.label(), error = %err, "recovery sweep failed"),
            }
            recovery_last_run = Some(now);
        }

        match repository.claim_next(config.kind).await {
            Ok(Some(mut item)) => {
                let outcome = run_guarded(handle(item.clone()))
                    .await
                    .unwrap_or_else(|| Err("handler panicked".to_owned()));
                item.complete_attempt(outcome, config.max_attempts, config.retry_delay);
                if let Err(err) = repository.update_status(&item).await {
                    error!(error = %err, item_id = %item.id, "failed to persist queue item status");
                }
            }
            Ok(None) => {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(config.poll_interval) => {}
                }
            }
            Err(err) => {
                warn!(kind = config.kind.label(), error = %err, "claim_next failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(config.poll_interval) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use signalbrief_repository_memory::MemoryQueueRepository;

    use super::*;

    #[tokio::test]
    async fn successful_handler_marks_row_done() {
        let repository: Arc<dyn QueueRepository> = Arc::new(MemoryQueueRepository::new());
        repository
            .enqueue(
                QueueKind::Enrichment,
                QueueItem::new_pending(QueueKind::Enrichment, HashMap::new()),
            )
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let processed = Arc::new(AtomicUsize::new(0));
        let p = processed.clone();
        let cancel_for_handler = cancel.clone();
        let config = QueueWorkerConfig {
            poll_interval: Duration::from_millis(5),
            ..QueueWorkerConfig::new(QueueKind::Enrichment)
        };

        let handle = tokio::spawn(run_queue_worker(
            cancel.clone(),
            repository.clone(),
            config,
            move |_item| {
                let p = p.clone();
                let cancel_for_handler = cancel_for_handler.clone();
                async move {
                    p.fetch_add(1, Ordering::SeqCst);
                    cancel_for_handler.cancel();
                    Ok(())
                }
            },
        ));

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not exit")
            .unwrap();

        assert_eq!(processed.load(Ordering::SeqCst), 1);
    }
}
