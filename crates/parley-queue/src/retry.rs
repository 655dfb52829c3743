// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attempt limits and exponential backoff.

use std::time::Duration;

use parley_config::model::QueueConfig;
use parley_core::JobRecord;

/// Backoff never exceeds this, whatever the attempt count.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// How many times a job may run and how long to wait between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts permitted, including the first. Never below 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles for each later one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, Duration::from_secs(2))
    }
}

impl RetryPolicy {
    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A single attempt, failures are final.
    pub fn no_retry() -> Self {
        Self::exponential(1, Duration::ZERO)
    }

    /// Rebuilds the policy a job was submitted with.
    pub fn from_job(job: &JobRecord) -> Self {
        Self::exponential(job.max_attempts, Duration::from_millis(job.backoff_base_ms))
    }

    /// Backoff to apply after attempt number `attempt` (1-indexed) failed.
    ///
    /// `base * 2^(attempt - 1)`, capped at [`MAX_BACKOFF`].
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2_u32.saturating_pow(attempt - 1);
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Whether another attempt is allowed after `attempts` have run.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl From<&QueueConfig> for RetryPolicy {
    fn from(config: &QueueConfig) -> Self {
        Self::exponential(
            config.max_attempts,
            Duration::from_millis(config.backoff_base_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn doubles_from_base() {
        let policy = RetryPolicy::exponential(3, Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(8000));
    }

    #[test]
    fn attempts_are_bounded() {
        let policy = RetryPolicy::exponential(3, Duration::from_millis(10));
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!RetryPolicy::no_retry().should_retry(1));
    }

    #[test]
    fn zero_attempts_means_one() {
        assert_eq!(RetryPolicy::exponential(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn from_queue_config_defaults() {
        let policy = RetryPolicy::from(&QueueConfig::default());
        assert_eq!(policy, RetryPolicy::default());
    }

    proptest! {
        #[test]
        fn delay_is_monotonic_and_capped(base_ms in 0u64..10_000, attempt in 1u32..64) {
            let policy = RetryPolicy::exponential(5, Duration::from_millis(base_ms));
            let here = policy.delay_for_attempt(attempt);
            let next = policy.delay_for_attempt(attempt + 1);
            prop_assert!(next >= here);
            prop_assert!(here <= MAX_BACKOFF);
        }
    }
}
