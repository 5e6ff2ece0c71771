use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ResolvedLinkId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Web,
    Telegram,
    Youtube,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Success,
    Failed,
    Pending,
}

/// A resolved, content-addressed link cache entry.
///
/// Content-addressed by `url_canonical`; entries carry a TTL that varies
/// per [`LinkType`] (see [`crate::link_ttl`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLink {
    pub id: ResolvedLinkId,
    pub url: String,
    pub url_canonical: String,
    pub domain: String,
    pub link_type: LinkType,

    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub language: Option<String>,
    pub word_count: Option<u32>,

    /// Populated only when `link_type == Telegram`.
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub channel_message_id: Option<i64>,

    pub status: LinkStatus,
    pub resolved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ResolvedLink {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Default cache TTL for a given link type.
#[must_use]
pub fn link_ttl(link_type: LinkType) -> chrono::Duration {
    match link_type {
        LinkType::Web => chrono::Duration::hours(24),
        LinkType::Telegram => chrono::Duration::hours(6),
        LinkType::Youtube => chrono::Duration::days(7),
        LinkType::Blocked => chrono::Duration::days(30),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_check() {
        let now = Utc::now();
        let link = ResolvedLink {
            id: ResolvedLinkId::new(),
            url: "https://example.com".into(),
            url_canonical: "https://example.com".into(),
            domain: "example.com".into(),
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
            resolved_at: now - chrono::Duration::hours(25),
            expires_at: now - chrono::Duration::hours(1),
        };
        assert!(link.is_expired(now));
    }

    #[test]
    fn ttl_varies_by_type() {
        assert!(link_ttl(LinkType::Telegram) < link_ttl(LinkType::Web));
        assert!(link_ttl(LinkType::Web) < link_ttl(LinkType::Youtube));
    }
}
