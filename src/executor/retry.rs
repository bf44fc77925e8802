use std::time::Duration;

use crate::core::{HelperConfig, HelperError};

/// Bounded fixed-backoff retry policy for statement execution.
///
/// A statement gets at most `max_retries + 1` attempts, separated by `wait`.
/// Only [`HelperError::is_retryable`] errors earn another attempt; anything
/// else (malformed SQL, template problems) surfaces after the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub wait: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_retries: u32, wait: Duration) -> Self {
        Self { max_retries, wait }
    }

    #[must_use]
    pub const fn from_config(config: &HelperConfig) -> Self {
        Self::new(config.max_retries, config.retry_wait())
    }

    /// Single attempt, no waiting.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether to try again after `attempts` failed attempts ending in `error`.
    #[must_use]
    pub const fn should_retry(&self, attempts: u32, error: &HelperError) -> bool {
        error.is_retryable() && attempts < self.max_attempts()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_budget() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let transient = HelperError::Transient("timeout".into());
        assert!(policy.should_retry(1, &transient));
        assert!(policy.should_retry(2, &transient));
        assert!(!policy.should_retry(3, &transient));
    }

    #[test]
    fn test_statement_errors_stop_immediately() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(1, &HelperError::Statement("syntax".into())));
        assert_eq!(policy.max_attempts(), 6);
    }

    #[test]
    fn test_none_policy() {
        assert!(!RetryPolicy::none().should_retry(1, &HelperError::Transient("x".into())));
    }
}
