//! Digest mode: print ready cluster summaries from the last lookback
//! window as NDJSON. Rendering the digest into a delivery channel
//! (email, chat message, static page) is a separate downstream concern;
//! this mode only produces the structured data behind it.

use std::sync::Arc;

use signalbrief_repository::ClusterRepository;

use crate::error::AppError;

pub async fn run(clusters: Arc<dyn ClusterRepository>, lookback: chrono::Duration, limit: usize) -> Result<(), AppError> {
    let since = chrono::Utc::now() - lookback;
    let summaries = clusters.list_since(since, limit).await?;
    for summary in summaries {
        println!("{}", serde_json::to_string(&summary)?);
    }
    Ok(())
}
