//! The provider seam, grounded on the teacher's `acteon-provider::DynProvider`
//! (`name`/`execute`/`health_check`) and `acteon-embedding::EmbeddingProvider`:
//! a small async trait any evidence source implements, plus a raw search
//! hit shape distinct from `signalbrief_core::EvidenceSource` (which
//! additionally carries the `item_id` a hit is bound to only after the
//! engine decides to keep it).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EnrichmentError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceHit {
    pub url: String,
    pub domain: String,
    pub title: String,
    pub description: String,
    pub agreement_score: f32,
    pub is_contradiction: bool,
}

#[async_trait]
pub trait EvidenceProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Self-hosted instances probe with an HTTP ping; API-keyed providers
    /// just check that a key is configured.
    async fn is_available(&self) -> bool;

    async fn search(&self, query: &str) -> Result<Vec<EvidenceHit>, EnrichmentError>;
}
