use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, RawMessageId};

/// A message ingested from a Telegram channel, immutable after ingestion.
///
/// Created by the ingestion collaborator (out of scope here) and never
/// mutated afterward; the pipeline only ever reads a `RawMessage` to
/// produce an [`crate::Item`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: RawMessageId,
    pub channel_id: ChannelId,
    pub channel_title: String,
    /// Free-form descriptive context about the channel (topic, language,
    /// editorial stance) used by downstream language/query routing.
    pub channel_context: String,
    pub tg_message_id: i64,
    pub tg_date: DateTime<Utc>,
    pub text: String,
    /// Opaque Telegram entities payload (bold/links/mentions spans), kept
    /// as raw bytes since the pipeline only walks it structurally.
    pub entities_json: Vec<u8>,
    pub media_json: Vec<u8>,
    pub media_data: Option<Vec<u8>>,
    /// Stable hash over normalized text and media references; the strict
    /// dedup key within a channel.
    pub canonical_hash: String,
    pub is_forward: bool,
    /// Per-channel thresholds copied in at ingest time so later threshold
    /// changes don't retroactively affect already-ingested messages.
    pub channel_relevance_threshold: f32,
    pub channel_importance_threshold: f32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawMessage {
        RawMessage {
            id: RawMessageId::new(),
            channel_id: ChannelId::from("123"),
            channel_title: "Example Channel".into(),
            channel_context: String::new(),
            tg_message_id: 42,
            tg_date: Utc::now(),
            text: "hello world".into(),
            entities_json: Vec::new(),
            media_json: Vec::new(),
            media_data: None,
            canonical_hash: "abc".into(),
            is_forward: false,
            channel_relevance_threshold: 0.5,
            channel_importance_threshold: 0.5,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn raw_message_serde_roundtrip() {
        let msg = sample();
        let json = serde_json::to_string(&msg).unwrap();
        let back: RawMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.canonical_hash, "abc");
        assert_eq!(back.channel_id, ChannelId::from("123"));
    }
}
