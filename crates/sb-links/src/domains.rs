//! Domain classification: telegram vs. blocked (mainstream social
//! networks we never crawl) vs. everything else, which is ordinary web —
//! with YouTube split out since it gets its own resolution path and TTL.

use signalbrief_core::LinkType;

use crate::telegram::is_telegram_host;

const BLOCKED_SUFFIXES: &[&str] = &[
    "facebook.com",
    "x.com",
    "twitter.com",
    "instagram.com",
    "tiktok.com",
    "reddit.com",
    "linkedin.com",
];

const YOUTUBE_SUFFIXES: &[&str] = &["youtube.com", "youtu.be"];

fn matches_suffix(host: &str, suffixes: &[&str]) -> bool {
    suffixes
        .iter()
        .any(|suffix| host == *suffix || host.ends_with(&format!(".{suffix}")))
}

/// Classify a lowercased host extracted from a candidate URL.
#[must_use]
pub fn classify_host(host: &str) -> LinkType {
    if is_telegram_host(host) {
        LinkType::Telegram
    } else if matches_suffix(host, YOUTUBE_SUFFIXES) {
        LinkType::Youtube
    } else if matches_suffix(host, BLOCKED_SUFFIXES) {
        LinkType::Blocked
    } else {
        LinkType::Web
    }
}

/// Whether `host` matches any entry in `domains` by exact match or
/// suffix (`sub.example.com` matches a `example.com` entry).
#[must_use]
pub fn domain_list_matches(host: &str, domains: &[String]) -> bool {
    domains.iter().any(|d| host == d || host.ends_with(&format!(".{d}")))
}
