//! Retry policy for contended updates.

use std::time::Duration;

/// Bounded retry with exponential backoff.
///
/// The default matches the update protocol: 5 attempts, sleeping
/// `300ms * 2^attempt` after each failed one (300, 600, 1200, 2400,
/// 4800 ms). Backoff is not jittered; the store's transaction isolation is
/// the correctness mechanism, backoff only spreads load.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Maximum number of read-resolve-write attempts.
    pub max_attempts: u32,
    /// Backoff base; doubled after every failed attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after the given zero-based failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Builder for retry policies.
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
        }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.policy.base_delay = delay;
        self
    }

    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backoff_schedule() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..policy.max_attempts)
            .map(|a| policy.delay(a).as_millis() as u64)
            .collect();

        assert_eq!(delays, vec![300, 600, 1200, 2400, 4800]);
        assert_eq!(delays.iter().sum::<u64>(), 9300);
    }

    #[test]
    fn test_builder() {
        let policy = RetryPolicyBuilder::new()
            .max_attempts(3)
            .base_delay(Duration::from_millis(10))
            .build();

        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay(2), Duration::from_millis(40));
    }
}
