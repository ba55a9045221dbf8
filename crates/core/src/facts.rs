use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::trivia::TriviaRequest;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FactError {
    #[error("fact service request failed: {0}")]
    Transport(String),
    #[error("fact service timed out")]
    Timeout,
    #[error("fact service answered with status {0}")]
    Status(u16),
    #[error("fact service returned an empty fact")]
    EmptyFact,
}

impl FactError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Status(status) => *status >= 500,
            Self::EmptyFact => false,
        }
    }
}

/// Source of trivia facts; the production implementation calls the Numbers API.
#[async_trait]
pub trait FactLookup: Send + Sync {
    async fn lookup(&self, request: &TriviaRequest) -> Result<String, FactError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 1, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{FactError, RetryPolicy};

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy { max_retries: 3, base_delay_ms: 100, max_delay_ms: 300 };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(300));
        assert_eq!(policy.backoff(40), Duration::from_millis(300));
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(FactError::Timeout.is_retryable());
        assert!(FactError::Transport("reset".to_owned()).is_retryable());
        assert!(FactError::Status(503).is_retryable());
        assert!(!FactError::Status(404).is_retryable());
        assert!(!FactError::EmptyFact.is_retryable());
    }
}
