//! Stage 4: request an embedding and attach it to the item, or mark the
//! item `error` with the joined error chain if every fallback fails.

use signalbrief_core::Item;
use signalbrief_llm::Registry;

pub async fn embed_item(registry: &Registry, item: &mut Item, text: &str) {
    match registry.dispatch_embed(None, text).await {
        Ok(vector) => item.embedding = Some(vector),
        Err(err) => item.mark_error(serde_json::json!({ "stage": "embed", "error": err.to_string() })),
    }
}
