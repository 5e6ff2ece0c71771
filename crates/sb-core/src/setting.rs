use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A key-value setting with history: every mutation records the acting
/// user and a timestamp.
///
/// Per DESIGN NOTES, this is deliberately not exposed as an opaque JSON
/// bag to callers — [`crate::SettingKey`] gives each known key a typed
/// accessor over this storage shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

/// A single recorded change to a [`Setting`], used by the settings history
/// table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingHistoryEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub changed_at: DateTime<Utc>,
    pub changed_by: String,
}

/// The known, typed setting keys consumed by the core. Each variant
/// encapsulates its own decode-with-default behavior via
/// [`SettingKey::decode`], replacing `GetSetting(key, &target)`'s dynamic
/// JSON decoding with an explicit registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    DomainAllowlist,
    DomainDenylist,
    LinkSeedExtensionDenylist,
    EnrichmentLanguagePolicy,
    FilterMode,
}

impl SettingKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DomainAllowlist => "domain_allowlist",
            Self::DomainDenylist => "domain_denylist",
            Self::LinkSeedExtensionDenylist => "link_seed_ext_denylist",
            Self::EnrichmentLanguagePolicy => "enrichment_language_policy",
            Self::FilterMode => "filter_mode",
        }
    }

    /// Decode a raw setting value into a list of strings, falling back to
    /// an empty list (never erroring the caller) if the value is absent or
    /// malformed.
    #[must_use]
    pub fn decode_string_list(value: Option<&serde_json::Value>) -> Vec<String> {
        value
            .and_then(serde_json::Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_key_labels() {
        assert_eq!(SettingKey::DomainAllowlist.as_str(), "domain_allowlist");
    }

    #[test]
    fn decode_string_list_defaults_on_missing() {
        assert!(SettingKey::decode_string_list(None).is_empty());
    }

    #[test]
    fn decode_string_list_happy_path() {
        let value = serde_json::json!(["a.com", "b.com"]);
        let list = SettingKey::decode_string_list(Some(&value));
        assert_eq!(list, vec!["a.com".to_string(), "b.com".to_string()]);
    }

    #[test]
    fn decode_string_list_defaults_on_wrong_shape() {
        let value = serde_json::json!({"not": "a list"});
        assert!(SettingKey::decode_string_list(Some(&value)).is_empty());
    }
}
