//! Core domain types shared across the signalbrief workspace.
//!
//! This crate is deliberately free of I/O: it holds the record types that
//! flow between the gateway, worker fabric, enrichment engine, link
//! seeder, and processing pipeline. This crate only owns the data shapes.

pub mod cluster;
pub mod error;
pub mod evidence;
pub mod ids;
pub mod item;
pub mod link;
pub mod message;
pub mod queue;
pub mod setting;

pub use cluster::ClusterSummary;
pub use error::CoreError;
pub use evidence::{EvidenceSource, EvidenceSummary};
pub use ids::{
    ChannelId, ClusterId, EvidenceSourceId, ItemId, QueueItemId, RawMessageId, ResolvedLinkId,
};
pub use item::{Item, ItemStatus};
pub use link::{LinkStatus, LinkType, ResolvedLink, link_ttl};
pub use message::RawMessage;
pub use queue::{QueueItem, QueueKind, QueueStatus};
pub use setting::{Setting, SettingHistoryEntry, SettingKey};
