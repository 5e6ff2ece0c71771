//! Language routing policy: decides which target languages a query should
//! be translated into before evidence providers are consulted.

use std::collections::HashMap;

/// Combines per-channel override, per-topic override, context-based rules,
/// and a default list into one effective target-language set.
#[derive(Debug, Clone, Default)]
pub struct LanguageRoutingPolicy {
    pub channel_overrides: HashMap<String, Vec<String>>,
    pub topic_overrides: HashMap<String, Vec<String>>,
    /// Evaluated in order; the first whose key is a substring of the
    /// channel context string wins.
    pub context_rules: Vec<(String, Vec<String>)>,
    pub default_languages: Vec<String>,
}

impl LanguageRoutingPolicy {
    #[must_use]
    pub fn new(default_languages: Vec<String>) -> Self {
        Self {
            default_languages,
            ..Self::default()
        }
    }

    pub fn with_channel_override(mut self, channel_id: impl Into<String>, languages: Vec<String>) -> Self {
        self.channel_overrides.insert(channel_id.into(), languages);
        self
    }

    pub fn with_topic_override(mut self, topic: impl Into<String>, languages: Vec<String>) -> Self {
        self.topic_overrides.insert(topic.into(), languages);
        self
    }

    pub fn with_context_rule(mut self, needle: impl Into<String>, languages: Vec<String>) -> Self {
        self.context_rules.push((needle.into(), languages));
        self
    }

    /// Resolve the effective target-language set for one item. Precedence:
    /// channel override, then topic override, then the first matching
    /// context rule, then the default list.
    #[must_use]
    pub fn target_languages(&self, channel_id: &str, topic: &str, channel_context: &str) -> Vec<String> {
        if let Some(languages) = self.channel_overrides.get(channel_id) {
            return languages.clone();
        }
        if let Some(languages) = self.topic_overrides.get(topic) {
            return languages.clone();
        }
        for (needle, languages) in &self.context_rules {
            if channel_context.contains(needle.as_str()) {
                return languages.clone();
            }
        }
        self.default_languages.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default() {
        let policy = LanguageRoutingPolicy::new(vec!["en".into()]);
        assert_eq!(policy.target_languages("chan1", "politics", ""), vec!["en"]);
    }

    #[test]
    fn channel_override_wins_over_everything() {
        let policy = LanguageRoutingPolicy::new(vec!["en".into()])
            .with_channel_override("chan1", vec!["ru".into()])
            .with_topic_override("politics", vec!["de".into()]);
        assert_eq!(policy.target_languages("chan1", "politics", ""), vec!["ru"]);
    }

    #[test]
    fn topic_override_wins_over_context_and_default() {
        let policy = LanguageRoutingPolicy::new(vec!["en".into()])
            .with_topic_override("politics", vec!["de".into()])
            .with_context_rule("military", vec!["uk".into()]);
        assert_eq!(
            policy.target_languages("chan9", "politics", "military affairs"),
            vec!["de"]
        );
    }

    #[test]
    fn context_rule_wins_over_default() {
        let policy = LanguageRoutingPolicy::new(vec!["en".into()])
            .with_context_rule("military", vec!["uk".into()]);
        assert_eq!(
            policy.target_languages("chan9", "other", "regional military news"),
            vec!["uk"]
        );
    }

    #[test]
    fn first_matching_context_rule_wins() {
        let policy = LanguageRoutingPolicy::new(vec!["en".into()])
            .with_context_rule("military", vec!["uk".into()])
            .with_context_rule("news", vec!["fr".into()]);
        assert_eq!(
            policy.target_languages("chan9", "other", "military news digest"),
            vec!["uk"]
        );
    }
}
