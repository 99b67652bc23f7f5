// Retry logic: exponential backoff with jitter
use crate::application::constants::{RETRY_BASE_DELAY, RETRY_MAX_JITTER};
use crate::domain::ClassifiedError;
use crate::port::JitterSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the query after the given backoff
    Retry(Duration),
    /// Do not retry, return the error to the caller
    Stop,
}

/// Backoff policy
///
/// Determines if a failed attempt should be retried based on:
/// - Error classification (only transient kinds are retried)
/// - Current attempt count vs. the request's retry budget
pub struct BackoffPolicy {
    jitter: Arc<dyn JitterSource>,
    base_delay: Duration,
    max_jitter: Duration,
}

impl BackoffPolicy {
    /// Create a new backoff policy
    ///
    /// # Arguments
    /// * `jitter` - Random source for the jitter term
    /// * `base_delay` - Base delay (default: 1000ms)
    /// * `max_jitter` - Upper bound of the jitter term (default: 500ms)
    pub fn new(jitter: Arc<dyn JitterSource>, base_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            jitter,
            base_delay,
            max_jitter,
        }
    }

    pub fn with_defaults(jitter: Arc<dyn JitterSource>) -> Self {
        Self::new(jitter, RETRY_BASE_DELAY, RETRY_MAX_JITTER)
    }

    /// Backoff before retry number `attempt`
    ///
    /// Formula: delay = 2^attempt * base_delay + random(0, max_jitter)
    ///
    /// The jitter term desynchronizes concurrent callers that hit the same
    /// transient condition, so they do not retry in lockstep.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.jitter_ms(self.max_jitter.as_millis() as u64);
        self.exponential(attempt) + Duration::from_millis(jitter_ms)
    }

    /// Largest delay `delay_for(attempt)` can return
    pub fn upper_bound(&self, attempt: u32) -> Duration {
        self.exponential(attempt) + self.max_jitter
    }

    fn exponential(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Decide whether the failure of attempt number `attempt` is retried
    pub fn should_retry(
        &self,
        error: &ClassifiedError,
        attempt: u32,
        max_retries: u32,
    ) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::Stop;
        }

        if attempt >= max_retries {
            warn!(
                attempt = attempt,
                max_retries = max_retries,
                kind = %error.kind,
                "Max retry attempts reached"
            );
            return RetryDecision::Stop;
        }

        RetryDecision::Retry(self.delay_for(attempt + 1))
    }
}
