//! Day/month request-budget tracking for enrichment provider calls.
//!
//! `signalbrief_llm::BudgetTracker` only tracks LLM token spend against a
//! single daily limit; enrichment providers are billed per search request
//! and the limits come in a day/month pair, so this is a separate small
//! tracker living at the app level rather than in `signalbrief-enrichment`
//! itself. Same reset-on-date-rollover idiom as `BudgetTracker`.

use chrono::{Datelike, NaiveDate, Utc};
use tokio::sync::Mutex;

struct BudgetState {
    daily_count: u64,
    monthly_count: u64,
    last_day: NaiveDate,
    last_month: (i32, u32),
}

pub struct EnrichmentBudget {
    daily_limit: u64,
    monthly_limit: u64,
    state: Mutex<BudgetState>,
}

impl EnrichmentBudget {
    #[must_use]
    pub fn new(daily_limit: u64, monthly_limit: u64) -> Self {
        let now = Utc::now().date_naive();
        Self {
            daily_limit,
            monthly_limit,
            state: Mutex::new(BudgetState {
                daily_count: 0,
                monthly_count: 0,
                last_day: now,
                last_month: (now.year(), now.month()),
            }),
        }
    }

    /// `true` if a request may proceed; increments the counters as a side
    /// effect so callers only need one check-and-consume call per request.
    pub async fn try_consume(&self) -> bool {
        let now = Utc::now().date_naive();
        let month_key = (now.year(), now.month());
        let mut state = self.state.lock().await;

        if now != state.last_day {
            state.daily_count = 0;
            state.last_day = now;
        }
        if month_key != state.last_month {
            state.monthly_count = 0;
            state.last_month = month_key;
        }

        if self.daily_limit != 0 && state.daily_count >= self.daily_limit {
            return false;
        }
        if self.monthly_limit != 0 && state.monthly_count >= self.monthly_limit {
            return false;
        }

        state.daily_count += 1;
        state.monthly_count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unlimited_budget_always_allows() {
        let budget = EnrichmentBudget::new(0, 0);
        for _ in 0..10 {
            assert!(budget.try_consume().await);
        }
    }

    #[tokio::test]
    async fn daily_limit_blocks_once_exhausted() {
        let budget = EnrichmentBudget::new(2, 0);
        assert!(budget.try_consume().await);
        assert!(budget.try_consume().await);
        assert!(!budget.try_consume().await);
    }

    #[tokio::test]
    async fn monthly_limit_blocks_once_exhausted() {
        let budget = EnrichmentBudget::new(0, 1);
        assert!(budget.try_consume().await);
        assert!(!budget.try_consume().await);
    }
}
