//! The `TelegramPeerResolver` seam has no implementation here: driving an
//! actual Telegram client (MTProto session, peer cache) is a separate
//! ingestion collaborator, out of scope for this binary. `reader` mode
//! consumes already-ingested `RawMessage` records, so Telegram peer
//! lookups during link resolution always miss.

use async_trait::async_trait;
use signalbrief_pipeline::{TelegramPeerInfo, TelegramPeerResolver};

pub struct UnresolvedTelegramPeerResolver;

#[async_trait]
impl TelegramPeerResolver for UnresolvedTelegramPeerResolver {
    async fn resolve(&self, _channel: &str) -> Option<TelegramPeerInfo> {
        None
    }
}
