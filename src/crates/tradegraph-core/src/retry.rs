//! Retry policy with exponential backoff
//!
//! Configurable retry envelope used for transient failures: tool calls that
//! hit network timeouts and LLM calls that hit connection-class errors. The
//! caller decides *whether* an error is retryable; this type only answers
//! "how many attempts" and "how long to wait".
//!
//! Default envelope: 3 attempts, 1 s initial wait, factor 2 (1 s → 2 s → 4 s),
//! optional jitter to spread concurrent retries.

use rand::Rng;
use std::time::Duration;

/// Exponential-backoff retry configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: usize,
    /// Initial interval between retries in seconds
    pub initial_interval: f64,
    /// Multiplier applied after each retry
    pub backoff_factor: f64,
    /// Maximum interval between retries in seconds
    pub max_interval: f64,
    /// Whether to add random jitter to intervals
    pub jitter: bool,
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget.
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            initial_interval: 1.0,
            backoff_factor: 2.0,
            max_interval: 60.0,
            jitter: true,
        }
    }

    /// Set the initial interval between retries.
    pub fn with_initial_interval(mut self, seconds: f64) -> Self {
        self.initial_interval = seconds;
        self
    }

    /// Set the backoff multiplier.
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Cap the interval between retries.
    pub fn with_max_interval(mut self, seconds: f64) -> Self {
        self.max_interval = seconds;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retrying after the given 0-indexed attempt.
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let base = self.initial_interval * self.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.max_interval);
        let final_delay = if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.5);
            capped * factor
        } else {
            capped
        };
        Duration::from_secs_f64(final_delay)
    }

    /// Whether another attempt is allowed after `attempt` attempts so far.
    pub fn should_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_envelope() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_interval, 1.0);
        assert_eq!(policy.backoff_factor, 2.0);
    }

    #[test]
    fn test_backoff_progression() {
        let policy = RetryPolicy::new(4).with_jitter(false);
        assert_eq!(policy.calculate_delay(0).as_secs_f64(), 1.0);
        assert_eq!(policy.calculate_delay(1).as_secs_f64(), 2.0);
        assert_eq!(policy.calculate_delay(2).as_secs_f64(), 4.0);
    }

    #[test]
    fn test_max_interval_cap() {
        let policy = RetryPolicy::new(10)
            .with_initial_interval(10.0)
            .with_max_interval(15.0)
            .with_jitter(false);
        assert_eq!(policy.calculate_delay(5).as_secs_f64(), 15.0);
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let policy = RetryPolicy::new(5).with_jitter(true);
        for _ in 0..20 {
            let d = policy.calculate_delay(1).as_secs_f64();
            assert!(d >= 1.0 && d <= 3.0);
        }
    }

    #[test]
    fn test_should_retry_respects_budget() {
        let policy = RetryPolicy::new(3);
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }
}
