//! Retry policy for card generation
//!
//! An error is retried only when its rendered text contains one of the
//! transient indicators (connection, timeout or TLS trouble). Everything else
//! fails the request on the spot.

use prodcards_kernel::llm::LLMError;
use std::time::Duration;

/// Indicator substrings of a transient failure, matched case-insensitively
pub const TRANSIENT_MARKERS: &[&str] = &[
    "connection reset",
    "connection refused",
    "connection aborted",
    "connection closed",
    "broken pipe",
    "timeout",
    "timed out",
    "ssl",
    "tls",
    "handshake",
];

/// Delay between attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed { delay_ms: u64 },
    /// Linear backoff with increment
    Linear {
        initial_delay_ms: u64,
        increment_ms: u64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Linear {
            initial_delay_ms: 3000,
            increment_ms: 3000,
        }
    }
}

impl BackoffStrategy {
    /// Calculate delay duration for a given retry (0-indexed)
    pub fn delay(&self, retry: u32) -> Duration {
        match self {
            Self::Fixed { delay_ms } => Duration::from_millis(*delay_ms),
            Self::Linear {
                initial_delay_ms,
                increment_ms,
            } => Duration::from_millis(*initial_delay_ms + *increment_ms * retry as u64),
        }
    }
}

/// When and how often to retry a card request
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    pub transient_markers: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::default(),
            transient_markers: TRANSIENT_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl RetryPolicy {
    /// Linear policy waiting `step`, `2 * step`, ... between attempts
    pub fn linear(max_attempts: u32, step: Duration) -> Self {
        let step_ms = step.as_millis() as u64;
        Self {
            max_attempts,
            backoff: BackoffStrategy::Linear {
                initial_delay_ms: step_ms,
                increment_ms: step_ms,
            },
            ..Default::default()
        }
    }

    /// Whether the error text carries a transient indicator
    pub fn is_transient(&self, error: &LLMError) -> bool {
        let text = error.to_string().to_lowercase();
        self.transient_markers
            .iter()
            .any(|m| text.contains(&m.to_lowercase()))
    }

    /// Wait before attempt `next_attempt` (1-based, so the first retry is 2)
    pub fn delay_before(&self, next_attempt: u32) -> Duration {
        self.backoff.delay(next_attempt.saturating_sub(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_waits_grow_by_three_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_before(2), Duration::from_secs(3));
        assert_eq!(policy.delay_before(3), Duration::from_secs(6));
    }

    #[test]
    fn fixed_backoff() {
        let backoff = BackoffStrategy::Fixed { delay_ms: 250 };
        assert_eq!(backoff.delay(0), Duration::from_millis(250));
        assert_eq!(backoff.delay(5), Duration::from_millis(250));
    }

    #[test]
    fn classifies_by_error_text() {
        let policy = RetryPolicy::default();
        assert!(policy.is_transient(&LLMError::NetworkError("Connection reset by peer".into())));
        assert!(policy.is_transient(&LLMError::Timeout("120s".into())));
        assert!(policy.is_transient(&LLMError::Other("SSL: CERTIFICATE_VERIFY_FAILED".into())));
        assert!(policy.is_transient(&LLMError::ApiError {
            code: Some("504".into()),
            message: "upstream request TIMED OUT".into(),
        }));

        assert!(!policy.is_transient(&LLMError::AuthError("bad credentials".into())));
        assert!(!policy.is_transient(&LLMError::ApiError {
            code: Some("400".into()),
            message: "invalid model".into(),
        }));
    }

    #[test]
    fn custom_markers() {
        let policy = RetryPolicy {
            transient_markers: vec!["Rate Limit".into()],
            ..Default::default()
        };
        assert!(policy.is_transient(&LLMError::Other("rate limit exceeded".into())));
        assert!(!policy.is_transient(&LLMError::Timeout("slow".into())));
    }
}
