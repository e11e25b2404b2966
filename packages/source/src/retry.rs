//! Retry with exponential backoff for transient source failures.
//!
//! Upstream report stores drop connections and time out under load. Every
//! source call made by the pipeline goes through [`fetch_with_retry`]:
//!
//! ```ignore
//! let reports = retry::fetch_with_retry("reports", &policy, || {
//!     source.fetch_reports(customer, month)
//! })
//! .await?;
//! ```
//!
//! Only errors for which [`SourceError::is_transient`] holds are retried;
//! everything else is returned on the first failure.

use std::future::Future;
use std::time::Duration;

use crate::SourceError;

/// Longest wait between two attempts, whatever the policy computes.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(600);

/// How often and how patiently to retry a source call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Wait after the first failure.
    pub initial_delay: Duration,
    /// Multiplier applied to the wait after each further failure.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    /// Three attempts, waiting 5s then 7.5s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(5),
            backoff_factor: 1.5,
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps, for tests and local files.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            backoff_factor: 1.0,
        }
    }

    /// Wait before retry number `retry` (1-based), capped at
    /// [`MAX_RETRY_DELAY`].
    #[must_use]
    pub fn delay_before(&self, retry: u32) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = self.backoff_factor.max(1.0);
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let seconds = self.initial_delay.as_secs_f64() * factor.powi(exponent);
        Duration::try_from_secs_f64(seconds).map_or(MAX_RETRY_DELAY, |d| d.min(MAX_RETRY_DELAY))
    }
}

/// Runs `operation` until it succeeds, fails permanently, or the policy's
/// attempts are used up.
///
/// # Errors
///
/// Returns the first non-transient error, or the last transient error
/// once all attempts have failed.
pub async fn fetch_with_retry<T, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_before(attempt);
                log::warn!(
                    "[{label}] transient error: {e}; retrying in {delay:?} \
                     (attempt {attempt}/{max_attempts})"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_transient() {
                    log::error!("[{label}] giving up after {max_attempts} attempts: {e}");
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn transient() -> SourceError {
        SourceError::Transient {
            message: "connection reset".to_string(),
        }
    }

    #[test]
    fn default_policy_backs_off_by_half() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(1), Duration::from_secs(5));
        assert_eq!(policy.delay_before(2), Duration::from_millis(7500));
    }

    #[test]
    fn huge_backoff_saturates_instead_of_overflowing() {
        let policy = RetryPolicy {
            max_attempts: 200,
            initial_delay: Duration::from_secs(5),
            backoff_factor: 1.5,
        };
        assert_eq!(policy.delay_before(150), MAX_RETRY_DELAY);

        for factor in [1e300, f64::INFINITY, f64::NAN] {
            let policy = RetryPolicy {
                backoff_factor: factor,
                ..RetryPolicy::default()
            };
            assert!(policy.delay_before(u32::MAX) <= MAX_RETRY_DELAY);
        }
        assert_eq!(RetryPolicy::immediate(3).delay_before(u32::MAX), Duration::ZERO);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = fetch_with_retry("test", &RetryPolicy::immediate(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err(transient()) } else { Ok(n) } }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fetch_with_retry("test", &RetryPolicy::immediate(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;

        assert!(matches!(result, Err(SourceError::Transient { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fetch_with_retry("test", &RetryPolicy::immediate(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(SourceError::InputNotFound {
                    path: "missing.csv".into(),
                    hint: "export it first".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(SourceError::InputNotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_between_attempts() {
        let start = tokio::time::Instant::now();
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
        };
        let result: Result<(), _> = fetch_with_retry("test", &policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }
}
