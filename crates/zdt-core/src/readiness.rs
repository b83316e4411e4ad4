//! Bounded-retry readiness polling.
//!
//! A started container is not a serving instance: the service still has to
//! connect to the store and apply its migration. [`wait_ready`] polls the
//! liveness endpoint until it answers or the attempt budget runs out.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use crate::client::AssetApi;
use crate::domain::{HarnessError, Result};

/// Default number of liveness attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default pause between attempts.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// How long to keep polling before declaring an instance dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessPolicy {
    pub max_attempts: u32,
    #[serde(with = "duration_secs", rename = "interval_secs")]
    pub interval: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl ReadinessPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Run `check` until it succeeds, sleeping `policy.interval` after every failure.
///
/// Returns the 1-based attempt that succeeded. After `max_attempts` consecutive
/// failures the last error is reported as [`HarnessError::ReadinessTimeout`].
pub async fn poll_until<F, Fut, E>(policy: &ReadinessPolicy, target: &str, mut check: F) -> Result<u32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<(), E>>,
    E: std::fmt::Display,
{
    let attempts = policy.attempts();
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match check().await {
            Ok(()) => {
                info!(instance = %target, attempt, "ready");
                return Ok(attempt);
            }
            Err(e) => {
                last_error = e.to_string();
                debug!(instance = %target, attempt, error = %last_error, "not ready yet");
            }
        }
        tokio::time::sleep(policy.interval).await;
    }

    Err(HarnessError::ReadinessTimeout {
        address: target.to_string(),
        attempts,
        last_error,
    })
}

/// Poll the instance's liveness endpoint until it is healthy.
pub async fn wait_ready(api: &dyn AssetApi, policy: &ReadinessPolicy) -> Result<u32> {
    poll_until(policy, api.address(), move || api.health()).await
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn default_policy_is_five_by_five() {
        let policy = ReadinessPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.interval, Duration::from_secs(5));
    }

    #[test]
    fn policy_round_trips_as_seconds() {
        let json = serde_json::to_value(ReadinessPolicy::new(3, Duration::from_secs(2))).unwrap();
        assert_eq!(json["interval_secs"], 2);
        let back: ReadinessPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(back.interval, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_first_healthy_probe_without_sleeping() {
        let started = tokio::time::Instant::now();
        let attempt = poll_until(&ReadinessPolicy::default(), "svc", || async {
            Ok::<(), String>(())
        })
        .await
        .expect("ready");
        assert_eq!(attempt, 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = ReadinessPolicy::new(5, Duration::from_secs(1));
        let attempt = poll_until(&policy, "svc", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("connection refused".to_string())
                } else {
                    Ok(())
                }
            }
        })
        .await
        .expect("ready");
        assert_eq!(attempt, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_probes_once() {
        let calls = AtomicU32::new(0);
        let policy = ReadinessPolicy::new(0, Duration::from_secs(1));
        let result = poll_until(&policy, "svc", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("down") }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
