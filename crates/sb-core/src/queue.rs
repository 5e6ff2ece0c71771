use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::QueueItemId;

/// Which logical queue a [`QueueItem`] belongs to. Each kind is backed by
/// its own table/namespace but shares the same claim/retry machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    Factcheck,
    Enrichment,
    Crawl,
}

impl QueueKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Factcheck => "factcheck",
            Self::Enrichment => "enrichment",
            Self::Crawl => "crawl",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Processing,
    Done,
    Error,
}

/// A generic queue row. One table per [`QueueKind`] in the repository
/// (factcheck, enrichment, crawl), all sharing this shape.
///
/// Invariant: a row in `processing` always has a non-null `claimed_at`; the
/// recovery sweep resets any `processing` row whose `claimed_at` is older
/// than 2x the per-item timeout back to `pending`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: QueueItemId,
    pub kind: QueueKind,
    /// Opaque payload keys, e.g. `item_id`, `raw_message_id`, `claim`,
    /// `normalized_claim` — shape depends on `kind`.
    pub payload_keys: HashMap<String, serde_json::Value>,
    pub status: QueueStatus,
    pub attempt_count: u32,
    pub claimed_at: Option<DateTime<Utc>>,
    pub retry_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueItem {
    #[must_use]
    pub fn new_pending(kind: QueueKind, payload_keys: HashMap<String, serde_json::Value>) -> Self {
        let now = Utc::now();
        Self {
            id: QueueItemId::new(),
            kind,
            payload_keys,
            status: QueueStatus::Pending,
            attempt_count: 0,
            claimed_at: None,
            retry_at: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this row should be reclaimed by the periodic recovery
    /// sweep: stuck in `processing` past `2 * item_timeout`.
    #[must_use]
    pub fn is_stuck(&self, now: DateTime<Utc>, item_timeout: chrono::Duration) -> bool {
        self.status == QueueStatus::Processing
            && self
                .claimed_at
                .is_some_and(|claimed_at| now - claimed_at > item_timeout * 2)
    }

    /// Reset a stuck row back to `pending`, as performed by the recovery
    /// sweep.
    pub fn recover(&mut self) {
        self.status = QueueStatus::Pending;
        self.claimed_at = None;
        self.retry_at = None;
        self.updated_at = Utc::now();
    }

    /// Transition this row on completion (`done`) or failure (`pending`
    /// with backoff, or terminal `error` once `max_attempts` is reached).
    pub fn complete_attempt(
        &mut self,
        outcome: Result<(), String>,
        max_attempts: u32,
        retry_delay: chrono::Duration,
    ) {
        self.updated_at = Utc::now();
        match outcome {
            Ok(()) => {
                self.status = QueueStatus::Done;
                self.error = None;
            }
            Err(err) => {
                self.error = Some(err);
                if self.attempt_count < max_attempts {
                    self.status = QueueStatus::Pending;
                    self.retry_at = Some(Utc::now() + retry_delay);
                } else {
                    self.status = QueueStatus::Error;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claimed_row(claimed_at: DateTime<Utc>) -> QueueItem {
        let mut item = QueueItem::new_pending(QueueKind::Enrichment, HashMap::new());
        item.status = QueueStatus::Processing;
        item.claimed_at = Some(claimed_at);
        item
    }

    #[test]
    fn stuck_row_detected_after_2x_timeout() {
        let now = Utc::now();
        let item = claimed_row(now - chrono::Duration::seconds(130));
        assert!(item.is_stuck(now, chrono::Duration::seconds(60)));
    }

    #[test]
    fn not_stuck_before_2x_timeout() {
        let now = Utc::now();
        let item = claimed_row(now - chrono::Duration::seconds(90));
        assert!(!item.is_stuck(now, chrono::Duration::seconds(60)));
    }

    #[test]
    fn recovery_resets_to_pending() {
        let now = Utc::now();
        let mut item = claimed_row(now - chrono::Duration::seconds(200));
        item.recover();
        assert_eq!(item.status, QueueStatus::Pending);
        assert!(item.claimed_at.is_none());
    }

    #[test]
    fn complete_attempt_retries_then_errors() {
        let mut item = QueueItem::new_pending(QueueKind::Crawl, HashMap::new());
        item.attempt_count = 1;
        item.complete_attempt(Err("boom".into()), 3, chrono::Duration::seconds(30));
        assert_eq!(item.status, QueueStatus::Pending);
        assert!(item.retry_at.is_some());

        item.attempt_count = 3;
        item.complete_attempt(Err("boom again".into()), 3, chrono::Duration::seconds(30));
        assert_eq!(item.status, QueueStatus::Error);
    }

    #[test]
    fn complete_attempt_success_marks_done() {
        let mut item = QueueItem::new_pending(QueueKind::Factcheck, HashMap::new());
        item.complete_attempt(Ok(()), 3, chrono::Duration::seconds(30));
        assert_eq!(item.status, QueueStatus::Done);
    }
}
