//! Retry policy for lock contention.

use std::time::Duration;

/// Bounded retry with jittered exponential backoff.
///
/// Applies only to store-level contention (lock-wait timeout,
/// serialization failure, deadlock). Business-rule failures are never
/// retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of placement attempts, including the first.
    pub max_attempts: u32,
    /// Backoff base; attempt `n` waits roughly `base * 2^(n-1)`.
    pub base_delay: Duration,
    /// Bound on the wait for a contended row lock before the store
    /// reports a retryable conflict.
    pub lock_timeout: Duration,
}

impl RetryPolicy {
    /// Returns the backoff before retry number `attempt` (1-based),
    /// with up to 50% random jitter so competing placements do not
    /// retry in lockstep.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(10);
        let base = self.base_delay.saturating_mul(1 << exp);
        let jitter_ms = rand::random_range(0..=base.as_millis().max(1) as u64 / 2);
        base + Duration::from_millis(jitter_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(25),
            lock_timeout: Duration::from_secs(5),
        }
    }
}
