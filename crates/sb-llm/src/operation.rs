//! The gateway's typed operation surface.
//!
//! Most operations are thin, named wrappers over a shared
//! [`CompletionRequest`]/[`CompletionResponse`] pair so the fallback
//! dispatch machinery only needs to know one request/response shape per
//! provider call; `Embed` and image generation get their own provider
//! methods since their payloads don't fit the text-completion shape.

use serde::{Deserialize, Serialize};

/// Which named operation a dispatch call is for. Drives task-chain lookup
/// and usage-counter labeling; does not change the wire request shape
/// beyond what each operation's constructor puts in the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    ProcessBatch,
    TranslateText,
    CompleteText,
    GenerateNarrative,
    GenerateNarrativeWithEvidence,
    SummarizeCluster,
    SummarizeClusterWithEvidence,
    GenerateClusterTopic,
    RelevanceGate,
    CompressSummariesForCover,
    GenerateDigestCover,
    ExtractBullets,
    Embed,
}

impl TaskType {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::ProcessBatch => "process_batch",
            Self::TranslateText => "translate_text",
            Self::CompleteText => "complete_text",
            Self::GenerateNarrative => "generate_narrative",
            Self::GenerateNarrativeWithEvidence => "generate_narrative_with_evidence",
            Self::SummarizeCluster => "summarize_cluster",
            Self::SummarizeClusterWithEvidence => "summarize_cluster_with_evidence",
            Self::GenerateClusterTopic => "generate_cluster_topic",
            Self::RelevanceGate => "relevance_gate",
            Self::CompressSummariesForCover => "compress_summaries_for_cover",
            Self::GenerateDigestCover => "generate_digest_cover",
            Self::ExtractBullets => "extract_bullets",
            Self::Embed => "embed",
        }
    }
}

/// A single text-completion request. Every named text operation (batch
/// summarization, translation, narrative/cluster summaries, relevance
/// gating, bullet extraction, cover copy) is modeled as one of these with
/// an operation-specific system prompt and user prompt.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: 0.2,
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Parsed result of the `RelevanceGate` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceDecision {
    pub decision: String,
    pub confidence: f32,
    pub reason: String,
}

impl RelevanceDecision {
    /// The fallback decision mandated by spec for an unparseable response:
    /// never fail the caller, default to treating the content as relevant.
    #[must_use]
    pub fn unparseable_fallback() -> Self {
        Self {
            decision: "relevant".into(),
            confidence: 0.5,
            reason: "failed to parse".into(),
        }
    }
}

/// One element of a `ProcessBatch` response: the gateway's per-message
/// scoring and summarization result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub source_channel: Option<String>,
    pub relevance_score: f32,
    pub importance_score: f32,
    pub topic: String,
    pub summary: String,
    pub language: String,
}

/// One input message handed to `ProcessBatch`, used both to build the
/// composite prompt and to align results back by `channel_title` when
/// the model's `index` fields are unusable.
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub channel_title: String,
    pub text: String,
    pub resolved_link_context: Option<String>,
}
