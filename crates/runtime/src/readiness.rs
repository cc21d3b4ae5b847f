use std::time::Duration;

use tracing::debug;

/// Bounded readiness polling.
///
/// Callers waiting on a one-time initialization check `ready` every
/// `interval`, at most `max_attempts` times, and then give up with a
/// retryable error instead of hanging.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl ReadinessPolicy {
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Upper bound on the time spent polling.
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        // 500ms x 60 = 30s.
        Self::new(Duration::from_millis(500), 60)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not ready after {attempts} attempts ({waited:?})")]
pub struct ReadinessTimeout {
    pub attempts: u32,
    pub waited: Duration,
}

/// Polls `ready` until it reports `true` or the policy is exhausted.
///
/// Returns the number of attempts it took. The first check happens
/// immediately, so an already-ready resource never sleeps.
pub async fn poll_until_ready<F>(policy: ReadinessPolicy, mut ready: F) -> Result<u32, ReadinessTimeout>
where
    F: FnMut() -> bool,
{
    for attempt in 1..=policy.max_attempts {
        if ready() {
            return Ok(attempt);
        }
        debug!(attempt, max = policy.max_attempts, "not ready, waiting");
        tokio::time::sleep(policy.interval).await;
    }
    if ready() {
        return Ok(policy.max_attempts + 1);
    }
    Err(ReadinessTimeout {
        attempts: policy.max_attempts,
        waited: policy.max_wait(),
    })
}
