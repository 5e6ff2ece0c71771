//! Pulling candidate links out of a raw message: a JSON-tree walk over
//! opaque entity/media blobs, a regex scan of the message text, and a
//! separate `@username` mention scan.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Walk a JSON value collecting every string found under a key named
/// `url` or `displayurl`, at any depth.
pub fn extract_urls_from_json(value: &Value) -> Vec<String> {
    let mut found = Vec::new();
    walk_json(value, &mut found);
    found
}

fn walk_json(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if (key.eq_ignore_ascii_case("url") || key.eq_ignore_ascii_case("displayurl"))
                    && let Value::String(s) = child
                {
                    found.push(s.clone());
                }
                walk_json(child, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_json(item, found);
            }
        }
        _ => {}
    }
}

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>\x22']+").expect("static pattern"));

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')'];

/// Regex-scan free text for `https?://…` runs, trimming trailing
/// punctuation that's almost always sentence structure, not URL content.
pub fn extract_urls_from_text(text: &str) -> Vec<String> {
    URL_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION).to_owned())
        .filter(|url| !url.is_empty())
        .collect()
}

// Telegram usernames are actually 5-32 characters; this accepts mentions
// as short as 4, matching the same discrepancy in telegram.rs's link regexes.
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9_]{4,32})").expect("static pattern"));

/// Scan text for `@username` mentions, returning the bare usernames
/// (without the leading `@`).
pub fn extract_mentions(text: &str) -> Vec<String> {
    MENTION_RE
        .captures_iter(text)
        .map(|c| c[1].to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn finds_url_keys_at_any_depth() {
        let value = json!({
            "entities": [
                {"type": "url", "url": "https://example.com/a"},
                {"type": "mention", "displayUrl": "https://example.com/b"},
            ],
            "nested": {"media": {"url": "https://example.com/c"}},
        });
        let mut urls = extract_urls_from_json(&value);
        urls.sort();
        assert_eq!(
            urls,
            vec![
                "https://example.com/a",
                "https://example.com/b",
                "https://example.com/c",
            ]
        );
    }

    #[test]
    fn trims_trailing_punctuation_from_scanned_urls() {
        let text = "check this out: https://example.com/path), also https://example.com/x.";
        let urls = extract_urls_from_text(text);
        assert_eq!(urls, vec!["https://example.com/path", "https://example.com/x"]);
    }

    #[test]
    fn extracts_bare_mentions() {
        let text = "cc @someuser and @another_one, not an email a@b.com";
        let mentions = extract_mentions(text);
        assert_eq!(mentions, vec!["someuser", "another_one"]);
    }
}
