//! Jittered exponential backoff for idempotent remote calls.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::debug;

/// Bounded retry policy. Only errors the caller classifies as retryable are
/// retried; everything else is returned on the first attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Fraction of the delay randomly added or removed, in `[0, 1]`.
    pub jitter: f64,
}

impl RetryPolicy {
    /// Creates a policy, clamping inputs into their valid ranges.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration, jitter: f64) -> Self {
        let base_delay = base_delay.max(Duration::from_millis(1));
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter: if jitter.is_finite() {
                jitter.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(1, Duration::from_millis(1), Duration::from_millis(1), 0.0)
    }

    /// Delay before retry number `retry` (zero-based).
    fn next_delay(&self, retry: u32) -> Duration {
        let exp = 2_u32.saturating_pow(retry);
        let delay = self.base_delay.saturating_mul(exp).min(self.max_delay);
        if self.jitter <= 0.0 {
            return delay;
        }
        let spread = delay.as_secs_f64() * self.jitter;
        let offset = rand::rng().random_range(-spread..=spread);
        Duration::from_secs_f64((delay.as_secs_f64() + offset).max(0.0))
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. `op` receives the zero-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns the last error produced by `op`.
    pub async fn retry_async<F, Fut, T, E>(
        &self,
        is_retryable: impl Fn(&E) -> bool,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !is_retryable(&err) {
                        return Err(err);
                    }
                    let delay = self.next_delay(attempt - 1);
                    debug!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "retrying remote call"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100), Duration::from_secs(2), 0.2)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(2), 0.0)
    }

    #[test]
    fn test_new_clamps_inputs() {
        let policy = RetryPolicy::new(0, Duration::ZERO, Duration::ZERO, 3.0);

        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_millis(1));
        assert_eq!(policy.max_delay, Duration::from_millis(1));
        assert!((policy.jitter - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_next_delay_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(500), 0.0);

        let delays: Vec<_> = (0..5).map(|retry| policy.next_delay(retry)).collect();

        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(delays[1], Duration::from_millis(200));
        assert_eq!(delays[2], Duration::from_millis(400));
        assert_eq!(delays[3], Duration::from_millis(500));
        assert_eq!(delays[4], Duration::from_millis(500));
    }

    #[test]
    fn test_jittered_delay_stays_within_spread() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(1), 0.5);

        for _ in 0..100 {
            let delay = policy.next_delay(0);
            assert!(delay >= Duration::from_millis(50) && delay <= Duration::from_millis(150));
        }
    }

    #[tokio::test]
    async fn test_retry_async_retries_until_success() {
        // Arrange
        let calls = AtomicU32::new(0);

        // Act
        let result: Result<&str, String> = fast(3)
            .retry_async(
                |_| true,
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt < 2 {
                            Err("unavailable".to_owned())
                        } else {
                            Ok("ok")
                        }
                    }
                },
            )
            .await;

        // Assert
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_async_stops_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = fast(2)
            .retry_async(
                |_| true,
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("still down".to_owned()) }
                },
            )
            .await;

        assert_eq!(result.unwrap_err(), "still down");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_async_returns_non_retryable_error_immediately() {
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = fast(5)
            .retry_async(
                |err: &String| err.starts_with("unavailable"),
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("not found".to_owned()) }
                },
            )
            .await;

        assert_eq!(result.unwrap_err(), "not found");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
