//! Usage recording and daily budget tracking.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use signalbrief_repository::{KeyKind, StateKey, StateStore};
use tokio::sync::Mutex;
use tracing::warn;

use crate::operation::TaskType;

const USAGE_PERSIST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
pub struct UsageCounters {
    pub requests: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub estimated_cost_millicents: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct UsageLabel {
    provider: String,
    model: String,
    task: TaskType,
    status: &'static str,
}

/// Every terminal provider call increments request counters labeled
/// `(provider, model, task, status)`; successes additionally accumulate
/// token counts and an estimated cost. In-process counters are exact and
/// synchronous; persistence to the repository is fire-and-forget.
pub struct UsageRecorder {
    counters: DashMap<UsageLabel, UsageCounters>,
    store: Arc<dyn StateStore>,
}

impl UsageRecorder {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            counters: DashMap::new(),
            store,
        }
    }

    /// Rough per-1000-token price in millicents, indexed by a substring
    /// match against the model family. Unknown families cost nothing —
    /// better to undercount spend than block a working provider.
    fn price_per_1k_millicents(model: &str) -> u64 {
        let model = model.to_lowercase();
        if model.contains("gpt-4o-mini") {
            15
        } else if model.contains("gpt-4o") || model.contains("gpt-4") {
            500
        } else if model.contains("claude-3-5-haiku") || model.contains("haiku") {
            25
        } else if model.contains("claude-3-opus") || model.contains("opus") {
            1500
        } else if model.contains("claude") {
            300
        } else {
            0
        }
    }

    pub async fn record_success(
        &self,
        provider: &str,
        model: &str,
        task: TaskType,
        prompt_tokens: u32,
        completion_tokens: u32,
        budget: &BudgetTracker,
    ) {
        let label = UsageLabel {
            provider: provider.to_owned(),
            model: model.to_owned(),
            task,
            status: "success",
        };
        let cost = u64::from(prompt_tokens + completion_tokens) * Self::price_per_1k_millicents(model)
            / 1000;

        {
            let mut entry = self.counters.entry(label).or_default();
            entry.requests += 1;
            entry.prompt_tokens += u64::from(prompt_tokens);
            entry.completion_tokens += u64::from(completion_tokens);
            entry.estimated_cost_millicents += cost;
        }

        budget.record_tokens(u64::from(prompt_tokens + completion_tokens)).await;
        self.persist(provider, model, task, "success").await;
    }

    pub async fn record_error(&self, provider: &str, model: &str, task: TaskType) {
        let label = UsageLabel {
            provider: provider.to_owned(),
            model: model.to_owned(),
            task,
            status: "error",
        };
        self.counters.entry(label).or_default().requests += 1;
        self.persist(provider, model, task, "error").await;
    }

    async fn persist(&self, provider: &str, model: &str, task: TaskType, status: &str) {
        let key = StateKey::new(
            KeyKind::Custom("usage".into()),
            format!("{provider}:{model}:{}:{status}", task.label()),
        );
        let store = Arc::clone(&self.store);
        let fut = async move { store.increment(&key, 1, None).await };
        if let Err(e) = tokio::time::timeout(USAGE_PERSIST_TIMEOUT, fut).await {
            warn!(provider, model, task = task.label(), "usage persistence timed out: {e}");
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, String, TaskType, &'static str, UsageCounters)> {
        self.counters
            .iter()
            .map(|entry| {
                let label = entry.key();
                (
                    label.provider.clone(),
                    label.model.clone(),
                    label.task,
                    label.status,
                    entry.value().clone(),
                )
            })
            .collect()
    }
}

/// A callback invoked when the daily token budget crosses the warning
/// (80%) or critical (100%) threshold. Runs detached so the hot path
/// never blocks on it.
pub type BudgetCallback = Arc<dyn Fn(BudgetEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetEvent {
    Warning,
    Critical,
}

struct BudgetState {
    daily_tokens: u64,
    last_reset_date: NaiveDate,
    warning_fired: bool,
    critical_fired: bool,
}

/// Tracks cumulative daily token usage against `daily_limit`, firing
/// `warning`/`critical` callbacks at most once per UTC day.
/// `daily_limit == 0` disables budget enforcement entirely.
pub struct BudgetTracker {
    daily_limit: u64,
    callback: Option<BudgetCallback>,
    state: Mutex<BudgetState>,
}

impl BudgetTracker {
    #[must_use]
    pub fn new(daily_limit: u64, callback: Option<BudgetCallback>) -> Self {
        Self {
            daily_limit,
            callback,
            state: Mutex::new(BudgetState {
                daily_tokens: 0,
                last_reset_date: Utc::now().date_naive(),
                warning_fired: false,
                critical_fired: false,
            }),
        }
    }

    pub async fn record_tokens(&self, n: u64) {
        let today = Utc::now().date_naive();
        let mut state = self.state.lock().await;

        if today != state.last_reset_date {
            state.daily_tokens = 0;
            state.last_reset_date = today;
            state.warning_fired = false;
            state.critical_fired = false;
        }

        state.daily_tokens += n;

        if self.daily_limit == 0 {
            return;
        }

        #[allow(clippy::cast_precision_loss)]
        let percentage = state.daily_tokens as f64 / self.daily_limit as f64;

        let event = if percentage >= 1.0 && !state.critical_fired {
            state.critical_fired = true;
            Some(BudgetEvent::Critical)
        } else if percentage >= 0.8 && !state.warning_fired {
            state.warning_fired = true;
            Some(BudgetEvent::Warning)
        } else {
            None
        };

        if let (Some(event), Some(callback)) = (event, self.callback.clone()) {
            tokio::spawn(async move { callback(event) });
        }
    }

    pub async fn daily_tokens(&self) -> u64 {
        self.state.lock().await.daily_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn fires_warning_then_critical_once_each() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let criticals = Arc::new(AtomicUsize::new(0));
        let w = Arc::clone(&warnings);
        let c = Arc::clone(&criticals);
        let tracker = BudgetTracker::new(
            100,
            Some(Arc::new(move |event| match event {
                BudgetEvent::Warning => {
                    w.fetch_add(1, Ordering::SeqCst);
                }
                BudgetEvent::Critical => {
                    c.fetch_add(1, Ordering::SeqCst);
                }
            })),
        );

        tracker.record_tokens(85).await;
        tokio::task::yield_now().await;
        assert_eq!(warnings.load(Ordering::SeqCst), 1);

        tracker.record_tokens(20).await;
        tokio::task::yield_now().await;
        assert_eq!(criticals.load(Ordering::SeqCst), 1);

        tracker.record_tokens(1).await;
        tokio::task::yield_now().await;
        assert_eq!(criticals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_limit_disables_firing() {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        let tracker = BudgetTracker::new(0, Some(Arc::new(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        })));
        tracker.record_tokens(1_000_000).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
