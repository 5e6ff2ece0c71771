use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use signalbrief_repository::{DistributedLock, LockGuard, StateError};
use tokio::time::Instant;
use uuid::Uuid;

/// Retry interval when polling for lock acquisition.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

struct LockRow {
    owner: String,
    expires_at: DateTime<Utc>,
}

/// In-memory [`DistributedLock`], backed by a [`DashMap`] of named rows.
///
/// Mirrors `signalbrief-repository-postgres`'s row-based lock: a name maps
/// to at most one live owner, and expired rows are dropped before each
/// acquire attempt so a crashed holder doesn't wedge the lock forever.
#[derive(Default)]
pub struct MemoryDistributedLock {
    rows: Arc<DashMap<String, LockRow>>,
}

impl MemoryDistributedLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn clean_expired(&self, name: &str) {
        let now = Utc::now();
        if self.rows.get(name).is_some_and(|row| row.expires_at <= now) {
            self.rows.remove(name);
        }
    }
}

#[async_trait]
impl DistributedLock for MemoryDistributedLock {
    async fn try_acquire(
        &self,
        name: &str,
        ttl: Duration,
    ) -> Result<Option<Box<dyn LockGuard>>, StateError> {
        self.clean_expired(name);

        let owner = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());

        let acquired = match self.rows.entry(name.to_owned()) {
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(LockRow {
                    owner: owner.clone(),
                    expires_at,
                });
                true
            }
            dashmap::mapref::entry::Entry::Occupied(_) => false,
        };

        if acquired {
            Ok(Some(Box::new(MemoryLockGuard {
                rows: self.rows.clone(),
                name: name.to_owned(),
                owner,
            })))
        } else {
            Ok(None)
        }
    }

    async fn acquire(
        &self,
        name: &str,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<Box<dyn LockGuard>, StateError> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(guard) = self.try_acquire(name, ttl).await? {
                return Ok(guard);
            }

            if Instant::now() >= deadline {
                return Err(StateError::Timeout(timeout));
            }

            let remaining = deadline - Instant::now();
            tokio::time::sleep(LOCK_POLL_INTERVAL.min(remaining)).await;
        }
    }
}

/// A held in-memory lock. Dropping without [`release`](LockGuard::release)
/// is safe; the row expires after its TTL.
pub struct MemoryLockGuard {
    rows: Arc<DashMap<String, LockRow>>,
    name: String,
    owner: String,
}

#[async_trait]
impl LockGuard for MemoryLockGuard {
    async fn extend(&self, duration: Duration) -> Result<(), StateError> {
        let mut row = self
            .rows
            .get_mut(&self.name)
            .filter(|row| row.owner == self.owner && row.expires_at > Utc::now())
            .ok_or_else(|| StateError::LockExpired(self.name.clone()))?;
        row.expires_at =
            Utc::now() + chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<(), StateError> {
        self.rows
            .remove_if(&self.name, |_, row| row.owner == self.owner);
        Ok(())
    }

    async fn is_held(&self) -> Result<bool, StateError> {
        Ok(self
            .rows
            .get(&self.name)
            .is_some_and(|row| row.owner == self.owner && row.expires_at > Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn conformance() {
        let lock = MemoryDistributedLock::new();
        signalbrief_repository::testing::run_lock_conformance_tests(&lock)
            .await
            .expect("conformance suite should pass");
    }
}
