//! Parse `ENRICHMENT_LANGUAGE_POLICY`'s JSON object into a
//! [`LanguageRoutingPolicy`] via its builder methods; the policy type
//! itself carries no serde derive since its context-rule ordering isn't a
//! natural fit for a map.
//!
//! Expected shape:
//! ```json
//! {
//!   "default_languages": ["en"],
//!   "channel_overrides": {"123456": ["ru", "en"]},
//!   "topic_overrides": {"politics": ["de"]},
//!   "context_rules": [["military", ["uk"]]]
//! }
//! ```

use signalbrief_enrichment::LanguageRoutingPolicy;

use crate::error::AppError;

pub fn parse(raw: &str) -> Result<LanguageRoutingPolicy, AppError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| AppError::Config(format!("invalid ENRICHMENT_LANGUAGE_POLICY json: {e}")))?;

    let default_languages = string_list(value.get("default_languages"));
    let mut policy = LanguageRoutingPolicy::new(default_languages);

    if let Some(map) = value.get("channel_overrides").and_then(serde_json::Value::as_object) {
        for (channel, languages) in map {
            policy = policy.with_channel_override(channel.clone(), string_list(Some(languages)));
        }
    }

    if let Some(map) = value.get("topic_overrides").and_then(serde_json::Value::as_object) {
        for (topic, languages) in map {
            policy = policy.with_topic_override(topic.clone(), string_list(Some(languages)));
        }
    }

    if let Some(rules) = value.get("context_rules").and_then(serde_json::Value::as_array) {
        for rule in rules {
            let Some(pair) = rule.as_array() else { continue };
            let Some(needle) = pair.first().and_then(serde_json::Value::as_str) else { continue };
            let languages = string_list(pair.get(1));
            policy = policy.with_context_rule(needle.to_owned(), languages);
        }
    }

    Ok(policy)
}

fn string_list(value: Option<&serde_json::Value>) -> Vec<String> {
    value
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_policy() {
        let raw = r#"{
            "default_languages": ["en"],
            "channel_overrides": {"chan1": ["ru"]},
            "topic_overrides": {"politics": ["de"]},
            "context_rules": [["military", ["uk"]]]
        }"#;
        let policy = parse(raw).unwrap();
        assert_eq!(policy.target_languages("chan1", "x", ""), vec!["ru"]);
        assert_eq!(policy.target_languages("other", "politics", ""), vec!["de"]);
        assert_eq!(policy.target_languages("other", "x", "military news"), vec!["uk"]);
        assert_eq!(policy.target_languages("other", "x", ""), vec!["en"]);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse("not json").is_err());
    }
}
