//! Processing pipeline: the per-message filter/link/summarize/embed/dedup
//! state machine (stages 1-6), plus the periodic clustering sweep
//! (stage 7) run separately under the worker fabric.

pub mod cluster;
pub mod config;
pub mod dedup;
pub mod embed;
pub mod error;
pub mod filter;
pub mod link_resolve;
pub mod pipeline;
pub mod summarize;

pub use cluster::run_cluster_sweep;
pub use config::{ClusterConfig, DedupConfig, FilterConfig, PipelineConfig};
pub use error::PipelineError;
pub use filter::{FilterInput, FilterMode, FilterRule, RuleAction, RuleType, apply_filter};
pub use link_resolve::{TelegramPeerInfo, TelegramPeerResolver, lookup_resolved_titles, resolve_and_seed};
pub use pipeline::{Outcome, extract_message_urls, process_raw_messages};
pub use summarize::{ThresholdOutcome, apply_thresholds, process_batch};
