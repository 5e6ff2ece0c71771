//! Advisory-locked periodic jobs: acquire a named lock, run the job if
//! acquired, release on every exit path (including a panic inside the
//! job), and quietly skip if another process already owns the interval.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use signalbrief_repository::DistributedLock;
use tracing::{debug, warn};

use crate::guard::run_guarded;

/// Try to acquire `name` for `ttl`; if acquired, run `job` and release
/// the lock regardless of whether `job` panicked. If the lock is held
/// elsewhere, skip silently (debug-logged).
pub async fn run_with_advisory_lock<F, Fut>(
    lock: Arc<dyn DistributedLock>,
    name: &str,
    ttl: Duration,
    job: F,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    match lock.try_acquire(name, ttl).await {
        Ok(Some(guard)) => {
            let _ = run_guarded(job()).await;
            if let Err(err) = guard.release().await {
                warn!(name, error = %err, "failed to release advisory lock");
            }
        }
        Ok(None) => {
            debug!(name, "advisory lock held by another process, skipping");
        }
        Err(err) => {
            warn!(name, error = %err, "failed to acquire advisory lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use signalbrief_repository_memory::MemoryDistributedLock;

    use super::*;

    #[tokio::test]
    async fn acquires_runs_and_releases() {
        let lock: Arc<dyn DistributedLock> = Arc::new(MemoryDistributedLock::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let r = runs.clone();

        run_with_advisory_lock(lock.clone(), "research-refresh", Duration::from_secs(30), move || {
            let r = r.clone();
            async move {
                r.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // released after the job completed, so a second caller can acquire it.
        let guard = lock
            .try_acquire("research-refresh", Duration::from_secs(30))
            .await
            .unwrap();
        assert!(guard.is_some());
    }

    #[tokio::test]
    async fn second_owner_skips_while_locked() {
        let lock: Arc<dyn DistributedLock> = Arc::new(MemoryDistributedLock::new());
        let _held = lock
            .try_acquire("research-refresh", Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();

        let runs = Arc::new(AtomicUsize::new(0));
        let r = runs.clone();
        run_with_advisory_lock(lock, "research-refresh", Duration::from_secs(30), move || {
            let r = r.clone();
            async move {
                r.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
