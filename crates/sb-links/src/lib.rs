//! Link extraction and crawl-queue seeding: pulling candidate URLs out
//! of raw message JSON and text, canonicalizing and classifying them,
//! parsing Telegram's own link shapes, and gating/filtering/indexing
//! eligible URLs to the crawl queue.

pub mod canonicalize;
pub mod domains;
pub mod error;
pub mod extract;
pub mod seed;
pub mod telegram;

pub use canonicalize::{canonicalize_url, extract_domain};
pub use domains::{classify_host, domain_list_matches};
pub use error::LinkError;
pub use extract::{extract_mentions, extract_urls_from_json, extract_urls_from_text};
pub use seed::{CrawlDocument, CrawlIndex, SeedCounters, SeedingSettings, document_id, seed_links};
pub use telegram::{TelegramLink, is_telegram_host, parse_telegram_link};
