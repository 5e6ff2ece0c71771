//! Reader mode: ingest already-collected [`RawMessage`] records as
//! newline-delimited JSON on stdin and persist each via
//! [`RawMessageRepository::create`]. The actual Telegram collection
//! (MTProto session, channel subscription, entity parsing) is a separate
//! out-of-scope collaborator that would feed this mode's stdin in a real
//! deployment.

use std::sync::Arc;

use signalbrief_core::RawMessage;
use signalbrief_repository::RawMessageRepository;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::error::AppError;

pub async fn run(raw_messages: Arc<dyn RawMessageRepository>) -> Result<(), AppError> {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut ingested = 0u64;
    let mut skipped = 0u64;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RawMessage>(&line) {
            Ok(message) => {
                if let Err(err) = raw_messages.create(message).await {
                    warn!(error = %err, "failed to persist raw message");
                    skipped += 1;
                    continue;
                }
                ingested += 1;
            }
            Err(err) => {
                warn!(error = %err, "skipping unparseable raw message line");
                skipped += 1;
            }
        }
    }

    info!(ingested, skipped, "reader mode reached end of input");
    Ok(())
}
