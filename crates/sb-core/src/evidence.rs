use serde::{Deserialize, Serialize};

use crate::ids::{EvidenceSourceId, ItemId};

/// An external-source corroboration record attached to an [`crate::Item`].
///
/// Related many-to-one with Item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSource {
    pub id: EvidenceSourceId,
    pub item_id: ItemId,
    pub url: String,
    pub domain: String,
    pub title: String,
    pub description: String,
    /// Clamped to `[0, 1]`.
    pub agreement_score: f32,
    pub is_contradiction: bool,
}

impl EvidenceSource {
    /// Clamp `agreement_score` into the valid `[0, 1]` range, matching the
    /// enrichment engine's binding step.
    pub fn clamp_agreement(&mut self) {
        self.agreement_score = self.agreement_score.clamp(0.0, 1.0);
    }
}

/// Per-item aggregate produced by the enrichment binding step: the overall
/// corroboration score and a per-domain histogram, exposed as metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceSummary {
    pub corroboration_score: f32,
    pub has_contradiction: bool,
    pub domain_histogram: std::collections::HashMap<String, u32>,
}

impl EvidenceSummary {
    #[must_use]
    pub fn from_sources(sources: &[EvidenceSource]) -> Self {
        if sources.is_empty() {
            return Self::default();
        }
        let mut histogram = std::collections::HashMap::new();
        let mut total = 0.0f32;
        let mut has_contradiction = false;
        for source in sources {
            *histogram.entry(source.domain.clone()).or_insert(0) += 1;
            total += source.agreement_score;
            has_contradiction |= source.is_contradiction;
        }
        Self {
            corroboration_score: (total / sources.len() as f32).clamp(0.0, 1.0),
            has_contradiction,
            domain_histogram: histogram,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(domain: &str, score: f32, contradiction: bool) -> EvidenceSource {
        EvidenceSource {
            id: EvidenceSourceId::new(),
            item_id: ItemId::new(),
            url: format!("https://{domain}/a"),
            domain: domain.into(),
            title: "t".into(),
            description: "d".into(),
            agreement_score: score,
            is_contradiction: contradiction,
        }
    }

    #[test]
    fn clamp_agreement_score() {
        let mut source = source("example.com", 1.5, false);
        source.clamp_agreement();
        assert_eq!(source.agreement_score, 1.0);
    }

    #[test]
    fn summary_averages_and_flags_contradiction() {
        let sources = vec![
            source("a.com", 0.8, false),
            source("b.com", 0.4, true),
        ];
        let summary = EvidenceSummary::from_sources(&sources);
        assert!((summary.corroboration_score - 0.6).abs() < 1e-6);
        assert!(summary.has_contradiction);
        assert_eq!(summary.domain_histogram.get("a.com"), Some(&1));
    }

    #[test]
    fn empty_sources_summary() {
        let summary = EvidenceSummary::from_sources(&[]);
        assert_eq!(summary.corroboration_score, 0.0);
        assert!(!summary.has_contradiction);
    }
}
