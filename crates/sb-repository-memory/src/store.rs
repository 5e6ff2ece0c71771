use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use signalbrief_repository::{CasResult, KeyKind, StateError, StateKey, StateStore};

struct Entry {
    value: String,
    version: u64,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

fn expiry(ttl: Option<Duration>) -> Option<DateTime<Utc>> {
    ttl.map(|d| Utc::now() + chrono::Duration::from_std(d).unwrap_or(chrono::Duration::zero()))
}

/// In-memory [`StateStore`], backed by [`DashMap`]. Intended for tests and
/// single-process deployments; state is lost on restart.
#[derive(Default)]
pub struct MemoryStateStore {
    entries: DashMap<StateKey, Entry>,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn check_and_set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StateError> {
        let now = Utc::now();
        if let Some(existing) = self.entries.get(key) {
            if !existing.is_expired(now) {
                return Ok(false);
            }
        }
        self.entries.insert(
            key.clone(),
            Entry {
                value: value.to_owned(),
                version: 1,
                expires_at: expiry(ttl),
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &StateKey) -> Result<Option<String>, StateError> {
        let now = Utc::now();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                self.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StateError> {
        let version = self.entries.get(key).map_or(1, |e| e.version + 1);
        self.entries.insert(
            key.clone(),
            Entry {
                value: value.to_owned(),
                version,
                expires_at: expiry(ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &StateKey) -> Result<bool, StateError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn increment(
        &self,
        key: &StateKey,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StateError> {
        let now = Utc::now();
        let mut entry = self.entries.entry(key.clone()).or_insert_with(|| Entry {
            value: "0".to_owned(),
            version: 0,
            expires_at: expiry(ttl),
        });
        if entry.is_expired(now) {
            entry.value = "0".to_owned();
            entry.version = 0;
            entry.expires_at = expiry(ttl);
        }
        let current: i64 = entry
            .value
            .parse()
            .map_err(|_| StateError::Serialization(format!("non-integer value at {key}")))?;
        let updated = current + delta;
        entry.value = updated.to_string();
        entry.version += 1;
        Ok(updated)
    }

    async fn compare_and_swap(
        &self,
        key: &StateKey,
        expected_version: u64,
        new_value: &str,
        ttl: Option<Duration>,
    ) -> Result<CasResult, StateError> {
        let now = Utc::now();
        let current_version = self
            .entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map_or(0, |e| e.version);

        if current_version != expected_version {
            return Ok(CasResult::Conflict {
                current_value: self.get(key).await?,
                current_version,
            });
        }

        self.entries.insert(
            key.clone(),
            Entry {
                value: new_value.to_owned(),
                version: current_version + 1,
                expires_at: expiry(ttl),
            },
        );
        Ok(CasResult::Ok)
    }

    async fn scan_keys_by_kind(&self, kind: KeyKind) -> Result<Vec<(String, String)>, StateError> {
        let now = Utc::now();
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().kind == kind && !e.value().is_expired(now))
            .map(|e| (e.key().id.clone(), e.value().value.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn conformance() {
        let store = MemoryStateStore::new();
        signalbrief_repository::testing::run_store_conformance_tests(&store)
            .await
            .expect("conformance suite should pass");
    }
}
