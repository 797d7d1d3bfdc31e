//! Bounded retries with jittered exponential backoff.
//!
//! The wait before retry `n` (1-based) is drawn uniformly from
//! `[min_backoff, ceiling(n)]`, where `ceiling(n) = min_backoff * 2^(n-1)`
//! clamped to `max_backoff`. Only errors for which
//! [`OracleError::is_retriable`] holds are retried.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::OracleError;

/// How often and how patiently to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Lower bound of every wait.
    pub min_backoff: Duration,
    /// Upper bound of every wait.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Reject policies that would never attempt a request.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Config`] for zero attempts or an inverted
    /// backoff range.
    pub fn validate(&self) -> Result<(), OracleError> {
        if self.max_attempts == 0 {
            return Err(OracleError::Config(
                "RETRY_MAX_ATTEMPTS must be at least 1".to_owned(),
            ));
        }
        if self.min_backoff > self.max_backoff {
            return Err(OracleError::Config(format!(
                "retry backoff range is inverted: {:?} > {:?}",
                self.min_backoff, self.max_backoff
            )));
        }
        Ok(())
    }

    /// Largest wait before retry number `retry` (1-based).
    pub fn backoff_ceiling(&self, retry: u32) -> Duration {
        let factor = 2_u32
            .checked_pow(retry.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.min_backoff
            .saturating_mul(factor)
            .clamp(self.min_backoff, self.max_backoff.max(self.min_backoff))
    }

    /// A random wait in `[min_backoff, backoff_ceiling(retry)]`.
    pub fn jittered_backoff<R: Rng + ?Sized>(&self, retry: u32, rng: &mut R) -> Duration {
        let low = millis(self.min_backoff);
        let high = millis(self.backoff_ceiling(retry)).max(low);
        Duration::from_millis(rng.random_range(low..=high))
    }

    fn next_wait(&self, retry: u32) -> Duration {
        self.jittered_backoff(retry, &mut rand::rng())
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Run `operation` until it succeeds, fails permanently or runs out of
/// attempts.
///
/// # Errors
///
/// Returns the last error when it is not retriable or when
/// `policy.max_attempts` attempts have failed.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, OracleError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OracleError>>,
{
    let mut attempt: u32 = 1;
    loop {
        let result = operation().await;
        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if !error.is_retriable() || attempt >= policy.max_attempts {
            return Err(error);
        }

        let wait = policy.next_wait(attempt);
        warn!(
            label,
            attempt,
            max_attempts = policy.max_attempts,
            wait_ms = millis(wait),
            error = %error,
            "retriable LLM failure, backing off"
        );
        tokio::time::sleep(wait).await;
        attempt = attempt.saturating_add(1);
    }
}
