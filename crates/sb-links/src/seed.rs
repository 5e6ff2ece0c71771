//! Seeding extracted URLs to the crawl queue: a global gate, a per-URL
//! eligibility filter, then an idempotent index-or-count-as-duplicate
//! write against a [`CrawlIndex`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::canonicalize::{canonicalize_url, extract_domain};
use crate::domains::domain_list_matches;
use crate::error::LinkError;
use crate::telegram::is_telegram_host;

#[derive(Debug, Clone)]
pub struct SeedingSettings {
    pub enabled: bool,
    pub search_index_url: String,
    pub max_pending: u64,
    pub max_links_per_message: usize,
    pub ext_denylist: Vec<String>,
    pub domain_denylist: Vec<String>,
    pub domain_allowlist: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CrawlDocument {
    pub url: String,
    pub source: &'static str,
    pub crawl_status: &'static str,
    pub crawl_depth: u32,
    pub crawl_seed_source: &'static str,
    pub crawl_seed_ref: String,
    pub indexed_at: DateTime<Utc>,
}

/// Seam onto the crawl search index: a document store keyed by a stable
/// id derived from the canonical URL. A real deployment backs this with
/// whatever full-text index runs the crawler; tests use an in-memory
/// double.
#[async_trait]
pub trait CrawlIndex: Send + Sync {
    async fn pending_count(&self) -> Result<u64, LinkError>;
    async fn document_exists(&self, doc_id: &str) -> Result<bool, LinkError>;
    async fn index_document(&self, doc_id: &str, doc: CrawlDocument) -> Result<(), LinkError>;
}

/// Stable (within one build) document id derived from the canonical URL.
#[must_use]
pub fn document_id(canonical_url: &str) -> String {
    let mut hasher = DefaultHasher::new();
    canonical_url.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedCounters {
    pub indexed: u64,
    pub duplicate: u64,
    pub skipped_disabled: u64,
    pub skipped_queue_full: u64,
    pub skipped_scheme: u64,
    pub skipped_telegram_host: u64,
    pub skipped_extension: u64,
    pub skipped_domain_denied: u64,
    pub skipped_not_allowlisted: u64,
    pub skipped_invalid_url: u64,
}

fn has_denied_extension(path: &str, denylist: &[String]) -> bool {
    let Some(file_name) = path.rsplit('/').next() else {
        return false;
    };
    let Some((_, ext)) = file_name.rsplit_once('.') else {
        return false;
    };
    denylist.iter().any(|denied| denied.eq_ignore_ascii_case(ext))
}

/// Seed every eligible URL among `urls` to the crawl queue via `index`.
/// `peer`/`message_id` identify the Telegram source for `crawl_seed_ref`.
pub async fn seed_links(
    settings: &SeedingSettings,
    index: &dyn CrawlIndex,
    urls: &[String],
    peer: &str,
    message_id: i64,
    counters: &mut SeedCounters,
) -> Result<(), LinkError> {
    if !settings.enabled || settings.search_index_url.is_empty() {
        counters.skipped_disabled += 1;
        return Ok(());
    }
    if index.pending_count().await? >= settings.max_pending {
        counters.skipped_queue_full += 1;
        return Ok(());
    }

    for url in urls.iter().take(settings.max_links_per_message) {
        let Ok(canonical) = canonicalize_url(url) else {
            counters.skipped_invalid_url += 1;
            continue;
        };
        let Ok(domain) = extract_domain(&canonical) else {
            counters.skipped_invalid_url += 1;
            continue;
        };

        let scheme_ok = canonical.starts_with("http://") || canonical.starts_with("https://");
        if !scheme_ok {
            counters.skipped_scheme += 1;
            continue;
        }
        if is_telegram_host(&domain) {
            counters.skipped_telegram_host += 1;
            continue;
        }
        let path = url::Url::parse(&canonical)
            .map(|u| u.path().to_owned())
            .unwrap_or_default();
        if has_denied_extension(&path, &settings.ext_denylist) {
            counters.skipped_extension += 1;
            continue;
        }
        if domain_list_matches(&domain, &settings.domain_denylist) {
            counters.skipped_domain_denied += 1;
            continue;
        }
        if !settings.domain_allowlist.is_empty() && !domain_list_matches(&domain, &settings.domain_allowlist) {
            counters.skipped_not_allowlisted += 1;
            continue;
        }

        let doc_id = document_id(&canonical);
        if index.document_exists(&doc_id).await? {
            counters.duplicate += 1;
            continue;
        }

        let doc = CrawlDocument {
            url: canonical,
            source: "web",
            crawl_status: "pending",
            crawl_depth: 0,
            crawl_seed_source: "telegram",
            crawl_seed_ref: format!("tg://peer/{peer}/msg/{message_id}"),
            indexed_at: Utc::now(),
        };
        index.index_document(&doc_id, doc).await?;
        counters.indexed += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct MemoryIndex {
        docs: Mutex<std::collections::HashSet<String>>,
        pending: u64,
    }

    #[async_trait]
    impl CrawlIndex for MemoryIndex {
        async fn pending_count(&self) -> Result<u64, LinkError> {
            Ok(self.pending)
        }

        async fn document_exists(&self, doc_id: &str) -> Result<bool, LinkError> {
            Ok(self.docs.lock().unwrap().contains(doc_id))
        }

        async fn index_document(&self, doc_id: &str, _doc: CrawlDocument) -> Result<(), LinkError> {
            self.docs.lock().unwrap().insert(doc_id.to_owned());
            Ok(())
        }
    }

    fn settings() -> SeedingSettings {
        SeedingSettings {
            enabled: true,
            search_index_url: "https://search.internal".into(),
            max_pending: 1000,
            max_links_per_message: 10,
            ext_denylist: vec!["pdf".into(), "exe".into()],
            domain_denylist: vec!["spam.example".into()],
            domain_allowlist: vec![],
        }
    }

    #[tokio::test]
    async fn indexes_new_eligible_url() {
        let index = MemoryIndex::default();
        let mut counters = SeedCounters::default();
        seed_links(
            &settings(),
            &index,
            &["https://news.example/a".to_owned()],
            "peer1",
            42,
            &mut counters,
        )
        .await
        .unwrap();
        assert_eq!(counters.indexed, 1);
        assert_eq!(counters.duplicate, 0);
    }

    #[tokio::test]
    async fn second_seed_of_same_url_counts_as_duplicate() {
        let index = MemoryIndex::default();
        let mut counters = SeedCounters::default();
        let urls = vec!["https://news.example/a".to_owned()];
        seed_links(&settings(), &index, &urls, "peer1", 1, &mut counters).await.unwrap();
        seed_links(&settings(), &index, &urls, "peer1", 2, &mut counters).await.unwrap();
        assert_eq!(counters.indexed, 1);
        assert_eq!(counters.duplicate, 1);
    }

    #[tokio::test]
    async fn rejects_denied_extension() {
        let index = MemoryIndex::default();
        let mut counters = SeedCounters::default();
        seed_links(
            &settings(),
            &index,
            &["https://news.example/report.pdf".to_owned()],
            "peer1",
            1,
            &mut counters,
        )
        .await
        .unwrap();
        assert_eq!(counters.skipped_extension, 1);
        assert_eq!(counters.indexed, 0);
    }

    #[tokio::test]
    async fn rejects_denied_domain() {
        let index = MemoryIndex::default();
        let mut counters = SeedCounters::default();
        seed_links(
            &settings(),
            &index,
            &["https://spam.example/a".to_owned()],
            "peer1",
            1,
            &mut counters,
        )
        .await
        .unwrap();
        assert_eq!(counters.skipped_domain_denied, 1);
    }

    #[tokio::test]
    async fn empty_allowlist_allows_anything_not_denied() {
        let index = MemoryIndex::default();
        let mut counters = SeedCounters::default();
        seed_links(
            &settings(),
            &index,
            &["https://anything.example/a".to_owned()],
            "peer1",
            1,
            &mut counters,
        )
        .await
        .unwrap();
        assert_eq!(counters.indexed, 1);
    }

    #[tokio::test]
    async fn nonempty_allowlist_rejects_unlisted_domain() {
        let mut config = settings();
        config.domain_allowlist = vec!["news.example".into()];
        let index = MemoryIndex::default();
        let mut counters = SeedCounters::default();
        seed_links(
            &config,
            &index,
            &["https://other.example/a".to_owned()],
            "peer1",
            1,
            &mut counters,
        )
        .await
        .unwrap();
        assert_eq!(counters.skipped_not_allowlisted, 1);
    }

    #[tokio::test]
    async fn disabled_gate_skips_everything() {
        let mut config = settings();
        config.enabled = false;
        let index = MemoryIndex::default();
        let mut counters = SeedCounters::default();
        seed_links(&config, &index, &["https://news.example/a".to_owned()], "peer1", 1, &mut counters)
            .await
            .unwrap();
        assert_eq!(counters.skipped_disabled, 1);
        assert_eq!(counters.indexed, 0);
    }
}
