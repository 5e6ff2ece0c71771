//! Per-provider circuit breaker, persisted in a [`StateStore`] so multiple
//! gateway instances share the same view of provider health.
//!
//! Three states, two parameters (`failure_threshold`, `reset_after`), no
//! success-threshold probing: half-open allows exactly one trial, and a
//! single success closes the circuit again.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use signalbrief_repository::{DistributedLock, KeyKind, StateKey, StateStore};
use tracing::{debug, info, warn};

const MUTATION_LOCK_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_after: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_after: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CircuitData {
    state: CircuitState,
    consecutive_failures: u32,
    #[serde(default)]
    last_failure_time_ms: Option<i64>,
    /// Set while a half-open probe is in flight, to avoid letting a second
    /// concurrent caller treat the same opening as its own probe.
    #[serde(default)]
    probe_in_flight: bool,
}

impl Default for CircuitData {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_time_ms: None,
            probe_in_flight: false,
        }
    }
}

/// Circuit breaker for a single provider. State lives in a `StateStore`
/// under `KeyKind::CircuitBreaker`; mutations are serialized through a
/// short-lived [`DistributedLock`] so concurrent callers don't race.
pub struct CircuitBreaker {
    provider: String,
    config: CircuitBreakerConfig,
    store: Arc<dyn StateStore>,
    lock: Arc<dyn DistributedLock>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        config: CircuitBreakerConfig,
        store: Arc<dyn StateStore>,
        lock: Arc<dyn DistributedLock>,
    ) -> Self {
        Self {
            provider: provider.into(),
            config,
            store,
            lock,
        }
    }

    fn state_key(&self) -> StateKey {
        StateKey::new(KeyKind::CircuitBreaker, &self.provider)
    }

    fn lock_name(&self) -> String {
        format!("cb:{}", self.provider)
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    async fn load(&self) -> CircuitData {
        match self.store.get(&self.state_key()).await {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_default(),
            Ok(None) => CircuitData::default(),
            Err(e) => {
                warn!(provider = %self.provider, error = %e, "failed to load circuit breaker state, defaulting to closed");
                CircuitData::default()
            }
        }
    }

    async fn save(&self, data: &CircuitData) {
        let Ok(json) = serde_json::to_string(data) else {
            return;
        };
        if let Err(e) = self.store.set(&self.state_key(), &json, None).await {
            warn!(provider = %self.provider, error = %e, "failed to persist circuit breaker state");
        }
    }

    fn publish_transition(&self, from: CircuitState, to: CircuitState) {
        info!(provider = %self.provider, from = %from, to = %to, "circuit_breaker_state_transition");
    }

    /// Whether a call may currently be attempted. May transition
    /// `Open -> HalfOpen` as a side effect once `reset_after` has elapsed.
    pub async fn can_attempt(&self) -> bool {
        let Some(guard) = self
            .lock
            .try_acquire(&self.lock_name(), MUTATION_LOCK_TTL)
            .await
            .ok()
            .flatten()
        else {
            // Lock contention: read without mutating, fail closed-ish by
            // allowing the attempt only if we're not clearly open.
            let data = self.load().await;
            return data.state != CircuitState::Open;
        };

        let mut data = self.load().await;
        let allowed = match data.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed_ms = data
                    .last_failure_time_ms
                    .map_or(i64::MAX, |t| (Self::now_ms() - t).max(0));
                #[allow(clippy::cast_possible_truncation)]
                let reset_ms = self.config.reset_after.as_millis() as i64;
                if elapsed_ms >= reset_ms {
                    debug!(provider = %self.provider, "circuit breaker entering half-open trial");
                    data.state = CircuitState::HalfOpen;
                    data.probe_in_flight = true;
                    self.save(&data).await;
                    self.publish_transition(CircuitState::Open, CircuitState::HalfOpen);
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => !data.probe_in_flight,
        };

        let _ = guard.release().await;
        allowed
    }

    pub async fn record_success(&self) {
        let Some(guard) = self
            .lock
            .try_acquire(&self.lock_name(), MUTATION_LOCK_TTL)
            .await
            .ok()
            .flatten()
        else {
            return;
        };

        let mut data = self.load().await;
        if data.state != CircuitState::Closed {
            self.publish_transition(data.state, CircuitState::Closed);
        }
        data.state = CircuitState::Closed;
        data.consecutive_failures = 0;
        data.probe_in_flight = false;
        self.save(&data).await;
        let _ = guard.release().await;
    }

    pub async fn record_failure(&self) {
        let Some(guard) = self
            .lock
            .try_acquire(&self.lock_name(), MUTATION_LOCK_TTL)
            .await
            .ok()
            .flatten()
        else {
            return;
        };

        let mut data = self.load().await;
        data.consecutive_failures += 1;
        data.last_failure_time_ms = Some(Self::now_ms());
        data.probe_in_flight = false;

        if data.state == CircuitState::HalfOpen {
            self.publish_transition(CircuitState::HalfOpen, CircuitState::Open);
            data.state = CircuitState::Open;
        } else if data.consecutive_failures >= self.config.failure_threshold
            && data.state == CircuitState::Closed
        {
            self.publish_transition(CircuitState::Closed, CircuitState::Open);
            data.state = CircuitState::Open;
        }

        self.save(&data).await;
        let _ = guard.release().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalbrief_repository_memory::{MemoryDistributedLock, MemoryStateStore};

    fn breaker(config: CircuitBreakerConfig) -> CircuitBreaker {
        CircuitBreaker::new(
            "test-provider",
            config,
            Arc::new(MemoryStateStore::new()),
            Arc::new(MemoryDistributedLock::new()),
        )
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let cb = breaker(CircuitBreakerConfig {
            failure_threshold: 3,
            reset_after: Duration::from_secs(60),
        });
        assert!(cb.can_attempt().await);
        for _ in 0..3 {
            cb.record_failure().await;
        }
        assert!(!cb.can_attempt().await);
    }

    #[tokio::test]
    async fn half_open_trial_after_reset_and_closes_on_success() {
        let cb = breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            reset_after: Duration::from_millis(0),
        });
        cb.record_failure().await;
        assert!(!matches!(cb.load().await.state, CircuitState::Closed));
        assert!(cb.can_attempt().await);
        cb.record_success().await;
        assert_eq!(cb.load().await.state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let cb = breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            reset_after: Duration::from_millis(0),
        });
        cb.record_failure().await;
        assert!(cb.can_attempt().await);
        cb.record_failure().await;
        assert_eq!(cb.load().await.state, CircuitState::Open);
    }
}
