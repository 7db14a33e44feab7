// Retry strategy for outbound execution attempts
//
// Attempts are numbered from 1. A failed attempt `n` is retried while
// `n <= max_retries`, so a job gets at most `max_retries + 1` attempts.

use std::time::Duration;

/// Retry strategy trait for calculating retry delays
pub trait RetryStrategy: Send + Sync {
    /// Delay before retrying after failed attempt `attempt` (1-based).
    /// Returns None once the retry budget is spent.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Additional attempts allowed after the first one
    fn max_retries(&self) -> u32;

    /// Check if failed attempt `attempt` may be retried
    fn should_retry(&self, attempt: u32) -> bool {
        attempt >= 1 && attempt <= self.max_retries()
    }
}

/// Linear backoff: waits `base_delay * attempt` after each failure
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    base_delay: Duration,
    max_retries: u32,
}

impl LinearBackoff {
    pub fn new(base_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_retries,
        }
    }

    pub fn from_millis(base_delay_ms: u64, max_retries: u32) -> Self {
        Self::new(Duration::from_millis(base_delay_ms), max_retries)
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self::from_millis(1000, 3)
    }
}

impl RetryStrategy for LinearBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_retry(attempt) {
            return None;
        }
        Some(self.base_delay.saturating_mul(attempt))
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_delay_sequence() {
        let strategy = LinearBackoff::from_millis(1000, 3);

        assert_eq!(strategy.next_delay(1), Some(Duration::from_millis(1000)));
        assert_eq!(strategy.next_delay(2), Some(Duration::from_millis(2000)));
        assert_eq!(strategy.next_delay(3), Some(Duration::from_millis(3000)));
    }

    #[test]
    fn test_retry_limit_enforcement() {
        let strategy = LinearBackoff::from_millis(10, 3);

        for attempt in 1..=3 {
            assert!(
                strategy.should_retry(attempt),
                "Should retry after attempt {}",
                attempt
            );
        }

        // The fourth attempt is the last one
        assert!(strategy.next_delay(4).is_none());
        assert!(!strategy.should_retry(5));
    }

    #[test]
    fn test_attempt_zero_is_not_a_failure() {
        let strategy = LinearBackoff::default();
        assert!(strategy.next_delay(0).is_none());
    }

    #[test]
    fn test_zero_retries_means_single_attempt() {
        let strategy = LinearBackoff::from_millis(500, 0);
        assert!(strategy.next_delay(1).is_none());
        assert_eq!(strategy.max_retries(), 0);
    }
}
