//! The three loop primitives every worker is built from: a poll loop with
//! interleaved periodic tasks, a ticker loop over N independent intervals,
//! and a single-ticker loop with an optional secondary interval. All three
//! share one contract: a [`CancellationToken`] checked at every iteration
//! and aborting any sleep, and panic recovery via [`run_guarded`] so a
//! misbehaving callback logs and moves on instead of killing the loop.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::guard::run_guarded;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type TaskFn = Box<dyn FnMut() -> BoxFuture<'static, ()> + Send>;

/// A task run on its own fixed interval, interleaved into a [`poll_loop`]
/// or driven independently by a [`ticker_loop`].
pub struct PeriodicTask {
    name: &'static str,
    interval: Duration,
    last_run: Option<DateTime<Utc>>,
    run: TaskFn,
}

impl PeriodicTask {
    pub fn new<F, Fut>(name: &'static str, interval: Duration, mut run: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name,
            interval,
            last_run: None,
            run: Box::new(move || Box::pin(run())),
        }
    }

    fn due(&self, now: DateTime<Utc>) -> bool {
        match self.last_run {
            None => true,
            Some(last) => {
                chrono::Duration::from_std(self.interval).is_ok_and(|interval| now - last >= interval)
            }
        }
    }
}

/// Poll loop: check cancellation, run any due periodic tasks, call
/// `process`, then sleep `poll_interval` (cancellable). `on_error` decides
/// whether a `process` failure is fatal to the loop (`false` = exit).
pub async fn poll_loop<P, Fut, E>(
    cancel: CancellationToken,
    poll_interval: Duration,
    mut periodic: Vec<PeriodicTask>,
    mut process: P,
    mut on_error: impl FnMut(&E) -> bool,
) where
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    Fut::Output: Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let now = Utc::now();
        for task in &mut periodic {
            if task.due(now) {
                if run_guarded((task.run)()).await.is_none() {
                    warn!(task = task.name, "periodic task did not complete cleanly");
                }
                task.last_run = Some(Utc::now());
            }
        }

        match run_guarded(process()).await {
            Some(Ok(())) => {}
            Some(Err(err)) => {
                warn!(error = %err, "poll loop process error");
                if !on_error(&err) {
                    break;
                }
            }
            None => {}
        }

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(poll_interval) => {}
        }
    }
}

/// One ticker task among the N driven by [`ticker_loop`]. Fires once
/// immediately, then again every `interval`.
pub struct TickerTask {
    name: &'static str,
    interval: Duration,
    next_due: Option<Instant>,
    run: TaskFn,
}

impl TickerTask {
    pub fn new<F, Fut>(name: &'static str, interval: Duration, mut run: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name,
            interval,
            next_due: None,
            run: Box::new(move || Box::pin(run())),
        }
    }
}

/// Ticker loop: N independent tasks, each on its own interval, polled at
/// 100ms granularity. Every task fires once at startup, then again on
/// each subsequent tick of its own interval.
pub async fn ticker_loop(cancel: CancellationToken, mut tasks: Vec<TickerTask>) {
    const GRANULARITY: Duration = Duration::from_millis(100);

    for task in &mut tasks {
        if run_guarded((task.run)()).await.is_none() {
            warn!(task = task.name, "initial ticker run did not complete cleanly");
        }
        task.next_due = Some(Instant::now() + task.interval);
    }

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(GRANULARITY) => {}
        }
        if cancel.is_cancelled() {
            break;
        }

        let now = Instant::now();
        for task in &mut tasks {
            if task.next_due.is_some_and(|due| now >= due) {
                if run_guarded((task.run)()).await.is_none() {
                    warn!(task = task.name, "ticker run did not complete cleanly");
                }
                task.next_due = Some(now + task.interval);
            }
        }
    }
}

/// Single-ticker loop: one main interval, plus an optional secondary
/// interval selected over alongside it.
pub async fn single_ticker_loop(
    cancel: CancellationToken,
    main_interval: Duration,
    main: TaskFn,
    secondary: Option<(Duration, TaskFn)>,
) {
    let mut main = main;
    let mut main_ticker = tokio::time::interval(main_interval);

    let Some((secondary_interval, mut secondary_run)) = secondary else {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = main_ticker.tick() => {
                    let _ = run_guarded(main()).await;
                }
            }
        }
        return;
    };

    let mut secondary_ticker = tokio::time::interval(secondary_interval);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = main_ticker.tick() => {
                let _ = run_guarded(main()).await;
            }
            _ = secondary_ticker.tick() => {
                let _ = run_guarded(secondary_run()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn poll_loop_runs_due_periodic_tasks_and_respects_cancellation() {
        let cancel = CancellationToken::new();
        let periodic_count = Arc::new(AtomicUsize::new(0));
        let process_count = Arc::new(AtomicUsize::new(0));

        let pc = periodic_count.clone();
        let task = PeriodicTask::new("counter", Duration::from_millis(10), move || {
            let pc = pc.clone();
            async move {
                pc.fetch_add(1, Ordering::SeqCst);
            }
        });

        let prc = process_count.clone();
        let cancel_for_process = cancel.clone();
        let handle = tokio::spawn(poll_loop(
            cancel.clone(),
            Duration::from_millis(5),
            vec![task],
            move || {
                let prc = prc.clone();
                let cancel_for_process = cancel_for_process.clone();
                async move {
                    let n = prc.fetch_add(1, Ordering::SeqCst);
                    if n >= 3 {
                        cancel_for_process.cancel();
                    }
                    Ok::<(), std::convert::Infallible>(())
                }
            },
            |_err: &std::convert::Infallible| true,
        ));

        tokio::time::advance(Duration::from_millis(200)).await;
        handle.await.unwrap();

        assert!(process_count.load(Ordering::SeqCst) >= 3);
        assert!(periodic_count.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn ticker_loop_fires_initial_run_once() {
        let cancel = CancellationToken::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let task = TickerTask::new("once", Duration::from_secs(3600), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        cancel.cancel();
        ticker_loop(cancel, vec![task]).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
