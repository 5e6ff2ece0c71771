//! Stage 1: the combined content filter. Ads keywords run first, then the
//! length/emoji/boilerplate/forward-shell heuristics, then the configured
//! rule list in the mode's chosen semantics.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    Mixed,
    Allowlist,
    Denylist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Keyword,
    Regex,
    Domain,
}

impl RuleType {
    fn reason(self) -> &'static str {
        match self {
            Self::Keyword => "filtered_keyword",
            Self::Regex => "filtered_regex",
            Self::Domain => "filtered_domain",
        }
    }
}

/// In `Mixed` mode a rule's action decides whether a match keeps or drops
/// the message; `Allowlist`/`Denylist` modes ignore it and treat every
/// rule uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRule {
    pub rule_type: RuleType,
    pub pattern: String,
    pub action: RuleAction,
}

impl FilterRule {
    #[must_use]
    pub fn deny(rule_type: RuleType, pattern: impl Into<String>) -> Self {
        Self { rule_type, pattern: pattern.into(), action: RuleAction::Deny }
    }

    #[must_use]
    pub fn allow(rule_type: RuleType, pattern: impl Into<String>) -> Self {
        Self { rule_type, pattern: pattern.into(), action: RuleAction::Allow }
    }

    fn matches(&self, text: &str, domains: &[String]) -> bool {
        match self.rule_type {
            RuleType::Keyword => text.to_lowercase().contains(&self.pattern.to_lowercase()),
            RuleType::Regex => Regex::new(&self.pattern).is_ok_and(|re| re.is_match(text)),
            RuleType::Domain => domains.iter().any(|d| {
                d.eq_ignore_ascii_case(&self.pattern)
                    || d.to_lowercase().ends_with(&format!(".{}", self.pattern.to_lowercase()))
            }),
        }
    }
}

/// Input to stage 1: everything the filter needs that isn't already a
/// config knob.
pub struct FilterInput<'a> {
    pub text: &'a str,
    pub domains: &'a [String],
    pub is_forward: bool,
}

/// Common emoji/pictograph/symbol code point ranges, checked directly
/// rather than via a Unicode property class the `regex` crate may not
/// ship tables for.
fn is_emoji_char(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1FAFF | 0x2600..=0x27BF | 0x1F1E6..=0x1F1FF | 0x2190..=0x21FF
    )
}

fn is_emoji_only(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    !trimmed.chars().any(|c| c.is_alphanumeric())
        && trimmed.chars().any(|c| !c.is_whitespace())
        && trimmed.chars().any(is_emoji_char)
}

static URL_IN_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("static pattern"));

/// A message is boilerplate-only if, once a URL and any configured CTA
/// phrase are stripped, nothing meaningful remains.
fn is_boilerplate_only(text: &str, phrases: &[String]) -> bool {
    let lower = text.to_lowercase();
    if !phrases.iter().any(|p| lower.contains(&p.to_lowercase())) {
        return false;
    }
    let without_url = URL_IN_TEXT_RE.replace_all(&lower, "");
    let mut remainder = without_url.into_owned();
    for phrase in phrases {
        remainder = remainder.replace(&phrase.to_lowercase(), "");
    }
    remainder.chars().filter(|c| c.is_alphanumeric()).count() < 4
}

/// Evaluate stage 1 for one message. Returns `Some(reason)` if it should
/// be dropped, `None` if it passes.
#[must_use]
pub fn apply_filter(
    config: &crate::config::FilterConfig,
    input: &FilterInput<'_>,
) -> Option<&'static str> {
    let lower_text = input.text.to_lowercase();
    if config.ads_keywords.iter().any(|kw| lower_text.contains(&kw.to_lowercase())) {
        return Some("ads_keyword");
    }

    if input.text.trim().chars().count() < config.min_length {
        return Some("too_short");
    }
    if is_emoji_only(input.text) {
        return Some("emoji_only");
    }
    if is_boilerplate_only(input.text, &config.boilerplate_phrases) {
        return Some("boilerplate");
    }
    if input.is_forward && input.text.trim().is_empty() {
        return Some("forward_shell");
    }

    match config.mode {
        FilterMode::Denylist => config
            .rules
            .iter()
            .find(|rule| rule.matches(input.text, input.domains))
            .map(|rule| rule.rule_type.reason()),
        FilterMode::Allowlist => {
            if config.rules.is_empty() {
                None
            } else if config.rules.iter().any(|rule| rule.matches(input.text, input.domains)) {
                None
            } else {
                Some("not_allowlisted")
            }
        }
        FilterMode::Mixed => config
            .rules
            .iter()
            .find(|rule| rule.matches(input.text, input.domains))
            .and_then(|rule| match rule.action {
                RuleAction::Deny => Some(rule.rule_type.reason()),
                RuleAction::Allow => None,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;

    fn input(text: &'static str) -> FilterInput<'static> {
        FilterInput { text, domains: &[], is_forward: false }
    }

    #[test]
    fn ads_keyword_runs_before_pattern_rules() {
        let mut config = FilterConfig::default();
        config.ads_keywords = vec!["buy now".into()];
        config.min_length = 0;
        assert_eq!(apply_filter(&config, &input("buy now at our store today")), Some("ads_keyword"));
    }

    #[test]
    fn too_short_is_dropped() {
        let config = FilterConfig { min_length: 20, ..FilterConfig::default() };
        assert_eq!(apply_filter(&config, &input("hi")), Some("too_short"));
    }

    #[test]
    fn emoji_only_is_dropped() {
        let config = FilterConfig { min_length: 0, ..FilterConfig::default() };
        assert_eq!(apply_filter(&config, &input("\u{1F600}\u{1F600}\u{1F600}")), Some("emoji_only"));
    }

    #[test]
    fn boilerplate_only_is_dropped() {
        let config = FilterConfig { min_length: 0, ..FilterConfig::default() };
        let text = "Subscribe now! https://example.com/join";
        assert_eq!(apply_filter(&config, &input(text)), Some("boilerplate"));
    }

    #[test]
    fn forward_with_no_text_is_dropped() {
        let config = FilterConfig { min_length: 0, ..FilterConfig::default() };
        let mut i = input("");
        i.is_forward = true;
        assert_eq!(apply_filter(&config, &i), Some("forward_shell"));
    }

    #[test]
    fn denylist_mode_drops_on_match() {
        let mut config = FilterConfig { min_length: 0, ..FilterConfig::default() };
        config.mode = FilterMode::Denylist;
        config.rules = vec![FilterRule::deny(RuleType::Keyword, "spam")];
        assert_eq!(
            apply_filter(&config, &input("this is spam content here")),
            Some("filtered_keyword")
        );
    }

    #[test]
    fn allowlist_mode_with_no_rules_passes_everything() {
        let config = FilterConfig { min_length: 0, mode: FilterMode::Allowlist, ..FilterConfig::default() };
        assert_eq!(apply_filter(&config, &input("anything whatsoever goes here")), None);
    }

    #[test]
    fn allowlist_mode_drops_unmatched() {
        let mut config = FilterConfig { min_length: 0, mode: FilterMode::Allowlist, ..FilterConfig::default() };
        config.rules = vec![FilterRule::allow(RuleType::Keyword, "news")];
        assert_eq!(apply_filter(&config, &input("weather report today")), Some("not_allowlisted"));
    }

    #[test]
    fn mixed_mode_allow_rule_overrides_later_deny() {
        let mut config = FilterConfig { min_length: 0, mode: FilterMode::Mixed, ..FilterConfig::default() };
        config.rules = vec![
            FilterRule::allow(RuleType::Keyword, "official"),
            FilterRule::deny(RuleType::Keyword, "crypto"),
        ];
        assert_eq!(apply_filter(&config, &input("official crypto announcement")), None);
    }

    #[test]
    fn mixed_mode_deny_rule_drops() {
        let mut config = FilterConfig { min_length: 0, mode: FilterMode::Mixed, ..FilterConfig::default() };
        config.rules = vec![FilterRule::deny(RuleType::Domain, "spam.example")];
        let i = FilterInput { text: "check this out", domains: &["spam.example".into()], is_forward: false };
        assert_eq!(apply_filter(&config, &i), Some("filtered_domain"));
    }

    #[test]
    fn domain_rule_matches_subdomain_by_suffix() {
        let mut config = FilterConfig { min_length: 0, mode: FilterMode::Denylist, ..FilterConfig::default() };
        config.rules = vec![FilterRule::deny(RuleType::Domain, "spam.example")];
        let i = FilterInput { text: "check this out", domains: &["mail.spam.example".into()], is_forward: false };
        assert_eq!(apply_filter(&config, &i), Some("filtered_domain"));
    }
}
