//! Tunables for the pipeline's stages, grouped the way spec'd settings are
//! grouped: filter thresholds, batch size, dedup window/threshold.

use signalbrief_links::SeedingSettings;

use crate::filter::{FilterMode, FilterRule};

#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub mode: FilterMode,
    pub rules: Vec<FilterRule>,
    pub ads_keywords: Vec<String>,
    /// Below this many characters (after trimming), a message is dropped
    /// as too short to be meaningful.
    pub min_length: usize,
    /// Call-to-action phrases that, combined with a bare URL and nothing
    /// else, mark a message as boilerplate.
    pub boilerplate_phrases: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            mode: FilterMode::Mixed,
            rules: Vec::new(),
            ads_keywords: Vec::new(),
            min_length: 8,
            boilerplate_phrases: vec![
                "subscribe".into(),
                "donate".into(),
                "join our channel".into(),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Semantic-dedup lookback window, stage 6.
    pub window: chrono::Duration,
    /// Cosine-similarity threshold above which two items are considered
    /// duplicates, stage 6. Typically 0.9.
    pub similarity_threshold: f32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window: chrono::Duration::hours(48),
            similarity_threshold: 0.9,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub lookback: chrono::Duration,
    pub similarity_threshold: f32,
    pub max_candidates: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            lookback: chrono::Duration::hours(24),
            similarity_threshold: 0.8,
            max_candidates: 500,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub filter: FilterConfig,
    pub dedup: DedupConfig,
    pub cluster: ClusterConfig,
    pub seeding: SeedingSettings,
    /// Max messages grouped into one `ProcessBatch` call, stage 3.
    pub batch_size: usize,
    /// Messages at or under this length may still reach `ready` with an
    /// empty summary (see `Item::meets_ready_preconditions`).
    pub short_text_threshold: usize,
    /// How many raw messages to poll per pipeline tick.
    pub poll_batch: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            dedup: DedupConfig::default(),
            cluster: ClusterConfig::default(),
            seeding: SeedingSettings {
                enabled: true,
                search_index_url: String::new(),
                max_pending: 10_000,
                max_links_per_message: 10,
                ext_denylist: vec!["pdf".into(), "exe".into(), "zip".into()],
                domain_denylist: Vec::new(),
                domain_allowlist: Vec::new(),
            },
            batch_size: 10,
            short_text_threshold: 40,
            poll_batch: 50,
        }
    }
}
