//! Stage 2: resolve each extracted URL against the link cache, seeding
//! misses to the crawl index without blocking on the result. Telegram
//! links go through a dedicated peer lookup instead of the crawl seeder.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use signalbrief_core::{LinkStatus, LinkType, ResolvedLink, ResolvedLinkId};
use signalbrief_links::{
    SeedCounters, canonicalize_url, classify_host, extract_domain, parse_telegram_link, seed_links,
};
use signalbrief_repository::LinkCacheRepository;
use tracing::warn;

use crate::config::PipelineConfig;

/// Seam onto whatever system can answer "who is this Telegram peer":
/// a title, whether it's public, and its canonical channel id. Narrow by
/// design, same as `sb-enrichment`'s `EvidenceProvider`/`TranslationClient`
/// seams onto systems outside this stack.
#[async_trait]
pub trait TelegramPeerResolver: Send + Sync {
    async fn resolve(&self, channel: &str) -> Option<TelegramPeerInfo>;
}

#[derive(Debug, Clone)]
pub struct TelegramPeerInfo {
    pub channel_id: String,
    pub channel_title: String,
}

/// Resolve and seed every URL extracted from one message.
/// `peer`/`message_id` identify the source for crawl-seed provenance.
pub async fn resolve_and_seed(
    config: &PipelineConfig,
    link_cache: &dyn LinkCacheRepository,
    crawl_index: &dyn signalbrief_links::CrawlIndex,
    telegram: &dyn TelegramPeerResolver,
    urls: &[String],
    peer: &str,
    message_id: i64,
) -> SeedCounters {
    let mut web_urls = Vec::new();

    for url in urls {
        let Ok(canonical) = canonicalize_url(url) else {
            continue;
        };
        let Ok(host) = extract_domain(&canonical) else {
            continue;
        };
        let link_type = classify_host(&host);

        if link_type == LinkType::Telegram {
            resolve_telegram_link(link_cache, telegram, url, &canonical, &host).await;
            continue;
        }

        match link_cache.get(&canonical).await {
            Ok(Some(_)) => continue,
            Ok(None) => web_urls.push(canonical),
            Err(err) => {
                warn!(error = %err, url = %canonical, "link cache lookup failed");
                web_urls.push(canonical);
            }
        }
    }

    let mut counters = SeedCounters::default();
    if let Err(err) =
        seed_links(&config.seeding, crawl_index, &web_urls, peer, message_id, &mut counters).await
    {
        warn!(error = %err, "crawl seeding failed");
    }
    counters
}

/// Look up cached resolved-link titles for a set of extracted URLs, for
/// callers that need them as enrichment/summarization context rather
/// than driving the resolve-and-seed side effects. Skips URLs that
/// don't canonicalize or that the cache doesn't have an entry for yet.
pub async fn lookup_resolved_titles(link_cache: &dyn LinkCacheRepository, urls: &[String]) -> Vec<String> {
    let mut titles = Vec::new();
    for url in urls {
        let Ok(canonical) = canonicalize_url(url) else {
            continue;
        };
        if let Ok(Some(link)) = link_cache.get(&canonical).await
            && let Some(title) = link.title
        {
            titles.push(title);
        }
    }
    titles
}

async fn resolve_telegram_link(
    link_cache: &dyn LinkCacheRepository,
    telegram: &dyn TelegramPeerResolver,
    original_url: &str,
    canonical: &str,
    host: &str,
) {
    if link_cache.get(canonical).await.ok().flatten().is_some() {
        return;
    }
    let Some(parsed) = parse_telegram_link(original_url) else {
        return;
    };
    let channel = match &parsed {
        signalbrief_links::TelegramLink::Post { channel, .. } => channel.clone(),
        signalbrief_links::TelegramLink::Channel { name } => name.clone(),
        signalbrief_links::TelegramLink::Invite { code } => code.clone(),
    };
    let Some(peer) = telegram.resolve(&channel).await else {
        return;
    };

    let now = Utc::now();
    let link = ResolvedLink {
        id: ResolvedLinkId::new(),
        url: original_url.to_owned(),
        url_canonical: canonical.to_owned(),
        domain: host.to_owned(),
        link_type: LinkType::Telegram,
        title: Some(peer.channel_title.clone()),
        content: None,
        author: None,
        published_at: None,
        language: None,
        word_count: None,
        channel_id: Some(peer.channel_id),
        channel_title: Some(peer.channel_title),
        channel_message_id: match parsed {
            signalbrief_links::TelegramLink::Post { message_id, .. } => Some(message_id as i64),
            _ => None,
        },
        status: LinkStatus::Success,
        resolved_at: now,
        expires_at: now + signalbrief_core::link_ttl(LinkType::Telegram),
    };
    if let Err(err) = link_cache.save(link).await {
        warn!(error = %err, "failed to persist resolved telegram link");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalbrief_links::CrawlDocument;
    use signalbrief_repository_memory::MemoryLinkCacheRepository;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryCrawlIndex {
        docs: Mutex<std::collections::HashSet<String>>,
    }

    #[async_trait]
    impl signalbrief_links::CrawlIndex for MemoryCrawlIndex {
        async fn pending_count(&self) -> Result<u64, signalbrief_links::LinkError> {
            Ok(0)
        }
        async fn document_exists(&self, doc_id: &str) -> Result<bool, signalbrief_links::LinkError> {
            Ok(self.docs.lock().unwrap().contains(doc_id))
        }
        async fn index_document(
            &self,
            doc_id: &str,
            _doc: CrawlDocument,
        ) -> Result<(), signalbrief_links::LinkError> {
            self.docs.lock().unwrap().insert(doc_id.to_owned());
            Ok(())
        }
    }

    struct NoopTelegramResolver;
    #[async_trait]
    impl TelegramPeerResolver for NoopTelegramResolver {
        async fn resolve(&self, _channel: &str) -> Option<TelegramPeerInfo> {
            None
        }
    }

    struct KnownTelegramResolver;
    #[async_trait]
    impl TelegramPeerResolver for KnownTelegramResolver {
        async fn resolve(&self, channel: &str) -> Option<TelegramPeerInfo> {
            Some(TelegramPeerInfo { channel_id: channel.to_owned(), channel_title: "Known Channel".into() })
        }
    }

    #[tokio::test]
    async fn web_url_cache_miss_seeds_crawl_index() {
        let mut config = PipelineConfig::default();
        config.seeding.search_index_url = "https://search.internal".into();
        let link_cache = MemoryLinkCacheRepository::new();
        let crawl_index = MemoryCrawlIndex::default();
        let counters = resolve_and_seed(
            &config,
            &link_cache,
            &crawl_index,
            &NoopTelegramResolver,
            &["https://news.example/a".to_owned()],
            "peer1",
            1,
        )
        .await;
        assert_eq!(counters.indexed, 1);
    }

    #[tokio::test]
    async fn telegram_link_resolves_via_peer_lookup_not_crawl_seed() {
        let config = PipelineConfig::default();
        let link_cache = MemoryLinkCacheRepository::new();
        let crawl_index = MemoryCrawlIndex::default();
        let counters = resolve_and_seed(
            &config,
            &link_cache,
            &crawl_index,
            &KnownTelegramResolver,
            &["https://t.me/somechannel/123".to_owned()],
            "peer1",
            1,
        )
        .await;
        assert_eq!(counters.indexed, 0);
        let cached = link_cache.get("https://t.me/somechannel/123").await.unwrap();
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn cached_web_link_is_not_reseeded() {
        let mut config = PipelineConfig::default();
        config.seeding.search_index_url = "https://search.internal".into();
        let link_cache = MemoryLinkCacheRepository::new();
        let now = Utc::now();
        link_cache
            .save(ResolvedLink {
                id: ResolvedLinkId::new(),
                url: "https://news.example/a".into(),
                url_canonical: "https://news.example/a".into(),
                domain: "news.example".into(),
                link_type: LinkType::Web,
                title: None,
                content: None,
                author: None,
                published_at: None,
                language: None,
                word_count: None,
                channel_id: None,
                channel_title: None,
                channel_message_id: None,
                status: LinkStatus::Success,
                resolved_at: now,
                expires_at: now + chrono::Duration::hours(1),
            })
            .await
            .unwrap();
        let crawl_index = MemoryCrawlIndex::default();
        let counters = resolve_and_seed(
            &config,
            &link_cache,
            &crawl_index,
            &NoopTelegramResolver,
            &["https://news.example/a".to_owned()],
            "peer1",
            1,
        )
        .await;
        assert_eq!(counters.indexed, 0);
    }
}
