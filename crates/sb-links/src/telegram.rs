//! Parsing `t.me/...` links into their three shapes: a post link, an
//! invite link, or a bare channel link.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelegramLink {
    /// `t.me/<username>/<msgid>` or `t.me/c/<internal_id>/<msgid>`.
    Post { channel: String, message_id: u64 },
    /// `t.me/+<code>` or `t.me/joinchat/<code>`.
    Invite { code: String },
    /// Any other `t.me/<name>` link.
    Channel { name: String },
}

// Telegram usernames are actually 5-32 characters; this regex accepts 4,
// a known discrepancy from the original extractor. Preserved as-is.
static POST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)t\.me/(c/\d+|[A-Za-z0-9_]{4,32})/(\d+)").expect("static pattern"));
static INVITE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)t\.me/(?:\+|joinchat/)([A-Za-z0-9_-]+)").expect("static pattern"));
// Same 4-character minimum discrepancy as POST_RE above.
static CHANNEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)t\.me/([A-Za-z0-9_]{4,32})").expect("static pattern"));

/// `true` iff `host` is a Telegram-internal host (`t.me`, `telegram.me`,
/// `telegram.dog`).
#[must_use]
pub fn is_telegram_host(host: &str) -> bool {
    matches!(host, "t.me" | "telegram.me" | "telegram.dog")
}

/// Parse a `t.me/...` URL (or bare path) into its link shape. Returns
/// `None` if it doesn't match any of the three known patterns.
#[must_use]
pub fn parse_telegram_link(url: &str) -> Option<TelegramLink> {
    if let Some(caps) = POST_RE.captures(url) {
        let channel = caps[1].to_owned();
        let message_id: u64 = caps[2].parse().ok()?;
        return Some(TelegramLink::Post { channel, message_id });
    }
    if let Some(caps) = INVITE_RE.captures(url) {
        return Some(TelegramLink::Invite { code: caps[1].to_owned() });
    }
    if let Some(caps) = CHANNEL_RE.captures(url) {
        return Some(TelegramLink::Channel { name: caps[1].to_owned() });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_username_post_link() {
        assert_eq!(
            parse_telegram_link("https://t.me/somechannel/1234"),
            Some(TelegramLink::Post { channel: "somechannel".into(), message_id: 1234 })
        );
    }

    #[test]
    fn parses_internal_id_post_link() {
        assert_eq!(
            parse_telegram_link("https://t.me/c/1234567890/42"),
            Some(TelegramLink::Post { channel: "c/1234567890".into(), message_id: 42 })
        );
    }

    #[test]
    fn parses_plus_invite_link() {
        assert_eq!(
            parse_telegram_link("https://t.me/+AbCdEf123"),
            Some(TelegramLink::Invite { code: "AbCdEf123".into() })
        );
    }

    #[test]
    fn parses_joinchat_invite_link() {
        assert_eq!(
            parse_telegram_link("https://t.me/joinchat/xyz123"),
            Some(TelegramLink::Invite { code: "xyz123".into() })
        );
    }

    #[test]
    fn parses_bare_channel_link() {
        assert_eq!(
            parse_telegram_link("https://t.me/somechannel"),
            Some(TelegramLink::Channel { name: "somechannel".into() })
        );
    }

    #[test]
    fn recognizes_telegram_internal_hosts() {
        assert!(is_telegram_host("t.me"));
        assert!(is_telegram_host("telegram.me"));
        assert!(!is_telegram_host("example.com"));
    }
}
