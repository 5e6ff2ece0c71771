use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, ItemId, RawMessageId};

/// Lifecycle status of an [`Item`] as it moves through the processing
/// pipeline's stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Ready,
    Duplicate,
    Dropped,
    Error,
}

impl ItemStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Duplicate | Self::Dropped | Self::Error)
    }
}

/// The processed artifact downstream of a [`crate::RawMessage`] that
/// survived filtering, 1:1 with its source message.
///
/// Owned by the processing pipeline; mutated only by stage transitions
/// (see the pipeline's state machine). `pending -> ready` and
/// `pending -> duplicate` may additionally be written by the later
/// clustering sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub raw_message_id: RawMessageId,

    pub relevance_score: f32,
    pub importance_score: f32,
    pub topic: String,
    /// At most 240 chars of minimal HTML.
    pub summary: String,
    /// ISO 639-1 code.
    pub language: String,

    pub status: ItemStatus,
    pub error_json: Option<serde_json::Value>,
    pub duplicate_of: Option<ItemId>,
    pub drop_reason: Option<String>,

    /// Fixed dimension per deployment; `None` means "no embedding yet" and
    /// is treated identically to a zero-length vector by dedup.
    pub embedding: Option<Vec<f32>>,

    pub tg_date: DateTime<Utc>,
    pub source_channel_id: ChannelId,
    pub source_channel_title: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Construct a fresh `pending` Item from its source message fields.
    #[must_use]
    pub fn new_pending(
        raw_message_id: RawMessageId,
        source_channel_id: ChannelId,
        source_channel_title: String,
        tg_date: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ItemId::new(),
            raw_message_id,
            relevance_score: 0.0,
            importance_score: 0.0,
            topic: String::new(),
            summary: String::new(),
            language: String::new(),
            status: ItemStatus::Pending,
            error_json: None,
            duplicate_of: None,
            drop_reason: None,
            embedding: None,
            tg_date,
            source_channel_id,
            source_channel_title,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark this item dropped with an explicit, non-error reason code.
    pub fn drop_with_reason(&mut self, reason: impl Into<String>) {
        self.status = ItemStatus::Dropped;
        self.drop_reason = Some(reason.into());
        self.updated_at = Utc::now();
    }

    /// Mark this item errored with a joined error chain.
    pub fn mark_error(&mut self, error: serde_json::Value) {
        self.status = ItemStatus::Error;
        self.error_json = Some(error);
        self.updated_at = Utc::now();
    }

    /// Mark this item a duplicate of an existing one.
    pub fn mark_duplicate_of(&mut self, existing: ItemId) {
        self.status = ItemStatus::Duplicate;
        self.duplicate_of = Some(existing);
        self.updated_at = Utc::now();
    }

    pub fn mark_ready(&mut self) {
        self.status = ItemStatus::Ready;
        self.updated_at = Utc::now();
    }

    /// An Item reaches `ready` only if: a non-empty summary (or short-enough
    /// source text), and an embedding is present. Dedup outcomes are
    /// evaluated separately by the pipeline before this gate is checked.
    #[must_use]
    pub fn meets_ready_preconditions(&self, text_len: usize, short_threshold: usize) -> bool {
        (!self.summary.is_empty() || text_len < short_threshold) && self.embedding.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Item {
        Item::new_pending(
            RawMessageId::new(),
            ChannelId::from("1"),
            "chan".into(),
            Utc::now(),
        )
    }

    #[test]
    fn new_item_is_pending() {
        let item = sample();
        assert_eq!(item.status, ItemStatus::Pending);
        assert!(!item.status.is_terminal());
    }

    #[test]
    fn ready_requires_embedding() {
        let mut item = sample();
        item.summary = "a summary".into();
        assert!(!item.meets_ready_preconditions(100, 20));
        item.embedding = Some(vec![0.1, 0.2]);
        assert!(item.meets_ready_preconditions(100, 20));
    }

    #[test]
    fn ready_allows_empty_summary_for_short_text() {
        let mut item = sample();
        item.embedding = Some(vec![0.1]);
        assert!(item.meets_ready_preconditions(5, 20));
        assert!(!item.meets_ready_preconditions(50, 20));
    }

    #[test]
    fn terminal_statuses() {
        assert!(ItemStatus::Dropped.is_terminal());
        assert!(ItemStatus::Duplicate.is_terminal());
        assert!(ItemStatus::Error.is_terminal());
        assert!(!ItemStatus::Pending.is_terminal());
        assert!(!ItemStatus::Ready.is_terminal());
    }
}
