//! Backoff policy for model calls
//!
//! A completion that fails with a transient error (connection failure,
//! timeout, HTTP 429 or 5xx) is attempted again after a delay that doubles
//! per attempt up to a cap. Everything else is returned on the first failure.

use crate::errors::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Attempts per completion, the first one included
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(8);

/// Retry policy applied by model agents around each completion
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Default::default()
        }
    }

    /// Single attempt, no backoff
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `call` until it succeeds, fails permanently or attempts run out
    ///
    /// The error of the last attempt is returned unchanged.
    pub async fn call<F, Fut, T>(&self, model: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut failures = 0;
        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            failures += 1;
            if !err.is_retryable() || failures >= self.max_attempts {
                return Err(err);
            }

            let delay = self.backoff(failures);
            warn!(
                model,
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient model failure"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Delay before the attempt following `failures` failed ones
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = 1u32.checked_shl(failures.saturating_sub(1)).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if !self.jitter || delay.is_zero() {
            return delay;
        }

        // Up to a quarter either way
        let spread = rand::random::<f64>() * 0.5 - 0.25;
        delay.mul_f64(1.0 + spread)
    }

    /// Upper bound on time spent sleeping for one completion, jitter aside
    pub fn worst_case_wait(&self) -> Duration {
        let fixed = self.clone().without_jitter();
        (1..self.max_attempts).map(|n| fixed.backoff(n)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AgentError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1)).without_jitter()
    }

    #[tokio::test]
    async fn test_recovers_from_rate_limit() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result = quick(5)
            .call("m", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AgentError::ModelApiError("HTTP 429: slow down".to_string()))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result = quick(3)
            .call("m", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AgentError::Timeout { duration_ms: 5 })
            })
            .await;

        assert!(matches!(result, Err(AgentError::Timeout { duration_ms: 5 })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result = quick(5)
            .call("m", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AgentError::ModelApiError("HTTP 401: bad key".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let policy = RetryPolicy::default().without_jitter();

        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_secs(1));
        assert_eq!(policy.backoff(4), Duration::from_secs(4));
        assert_eq!(policy.backoff(9), Duration::from_secs(8));
        assert_eq!(policy.backoff(40), Duration::from_secs(8));
        assert_eq!(policy.worst_case_wait(), Duration::from_millis(3500));
    }

    #[test]
    fn test_jitter_stays_within_a_quarter() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.backoff(2);
            assert!(delay >= Duration::from_millis(750) && delay <= Duration::from_millis(1250));
        }
    }

    #[test]
    fn test_none_makes_one_attempt() {
        assert_eq!(RetryPolicy::none().max_attempts(), 1);
        assert_eq!(RetryPolicy::none().worst_case_wait(), Duration::ZERO);
    }
}
