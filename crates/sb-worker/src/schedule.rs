//! Weekly scheduler: fires a job at most once per `(weekday, hour)`
//! window, with a grace period guarding against re-firing on every tick
//! within that hour.

use std::future::Future;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

/// Default grace period: a window must be at least this far in the past
/// before the same `(weekday, hour)` is allowed to fire again.
pub const DEFAULT_GRACE: chrono::Duration = chrono::Duration::days(6);

/// `true` iff `now` falls in the configured weekday/hour window and
/// either the job has never run, or its last run predates the window by
/// more than `grace`.
#[must_use]
pub fn should_run_weekly(
    now: DateTime<Utc>,
    day: Weekday,
    hour: u32,
    last_run: Option<DateTime<Utc>>,
    grace: chrono::Duration,
) -> bool {
    if now.weekday() != day || now.hour() != hour {
        return false;
    }
    match last_run {
        None => true,
        Some(last) => now - last > grace,
    }
}

/// A weekly job, carrying its own `last_run` watermark. Intended to be
/// polled roughly hourly (e.g. as a [`crate::loops::PeriodicTask`] on an
/// hourly interval) — `check_and_run` only needs its own window to be
/// checked, not driven at finer granularity.
pub struct WeeklySchedule {
    pub day: Weekday,
    pub hour: u32,
    pub grace: chrono::Duration,
    last_run: Option<DateTime<Utc>>,
}

impl WeeklySchedule {
    #[must_use]
    pub fn new(day: Weekday, hour: u32) -> Self {
        Self {
            day,
            hour,
            grace: DEFAULT_GRACE,
            last_run: None,
        }
    }

    #[must_use]
    pub fn with_grace(mut self, grace: chrono::Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Run `job` if the window is due, recording `now` as the new
    /// watermark. Fires at most once per window.
    pub async fn check_and_run<F, Fut>(&mut self, now: DateTime<Utc>, job: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        if should_run_weekly(now, self.day, self.hour, self.last_run, self.grace) {
            job().await;
            self.last_run = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monday_9am() -> DateTime<Utc> {
        "2026-07-27T09:00:00Z".parse().unwrap()
    }

    #[test]
    fn fires_on_first_occurrence() {
        let now = monday_9am();
        assert!(should_run_weekly(now, Weekday::Mon, 9, None, DEFAULT_GRACE));
    }

    #[test]
    fn does_not_fire_on_wrong_weekday() {
        let now = monday_9am();
        assert!(!should_run_weekly(now, Weekday::Tue, 9, None, DEFAULT_GRACE));
    }

    #[test]
    fn does_not_fire_on_wrong_hour() {
        let now = monday_9am();
        assert!(!should_run_weekly(now, Weekday::Mon, 10, None, DEFAULT_GRACE));
    }

    #[test]
    fn suppressed_within_grace_of_last_run() {
        let now = monday_9am();
        let last_run = now - chrono::Duration::days(1);
        assert!(!should_run_weekly(now, Weekday::Mon, 9, Some(last_run), DEFAULT_GRACE));
    }

    #[test]
    fn fires_again_after_grace_elapses() {
        let now = monday_9am();
        let last_run = now - chrono::Duration::days(7);
        assert!(should_run_weekly(now, Weekday::Mon, 9, Some(last_run), DEFAULT_GRACE));
    }

    #[test]
    fn minute_of_hour_is_irrelevant_to_the_predicate() {
        // should_run_weekly only looks at hour, not minute: it is the
        // caller's polling cadence (hourly) that keeps it from firing
        // more than once within the hour.
        let at_0013: DateTime<Utc> = "2026-07-27T09:13:00Z".parse().unwrap();
        assert!(should_run_weekly(at_0013, Weekday::Mon, 9, None, DEFAULT_GRACE));
    }

    #[tokio::test]
    async fn check_and_run_fires_at_most_once_per_window() {
        let mut schedule = WeeklySchedule::new(Weekday::Mon, 9);
        let mut runs = 0;
        schedule.check_and_run(monday_9am(), || async { runs += 1 }).await;
        schedule.check_and_run(monday_9am(), || async { runs += 1 }).await;
        assert_eq!(runs, 1);
    }
}
