//! Retry logic with exponential backoff
//!
//! One policy shared by every remote call: only network-class failures are
//! retried, delays grow geometrically up to a cap, and the number of
//! attempts is bounded.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::rest::RestError;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try
    pub max_retries: usize,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier (e.g., 2.0 for exponential backoff)
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration
    pub fn new(max_retries: usize) -> Self {
        Self { max_retries, ..Default::default() }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(0)
    }

    /// Set the initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Delay before retry number `attempt` (zero-based)
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }
}

/// Retry an async operation with a configurable retry policy
///
/// # Examples
/// ```
/// use postgrest_client::retry::{retry, RetryConfig};
/// use postgrest_client::RestError;
///
/// async fn example() -> Result<String, RestError> {
///     retry(
///         &RetryConfig::new(3),
///         |err: &RestError| err.is_network_error(),
///         || async { Ok("success".to_string()) },
///     )
///     .await
/// }
/// ```
pub async fn retry<F, Fut, T, E>(
    config: &RetryConfig,
    should_retry: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !should_retry(&err) || attempt >= config.max_retries {
                    return Err(err);
                }

                let delay = config.delay_for(attempt);
                tracing::debug!(attempt = attempt + 1, ?delay, "retrying after error: {}", err);
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Retry only network-class REST errors
pub async fn network_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T, RestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RestError>>,
{
    retry(config, RestError::is_network_error, operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast(max_retries: usize) -> RetryConfig {
        RetryConfig::new(max_retries).with_initial_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result = retry(&fast(3), |_: &String| true, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("success")
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_retries() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result = retry(&fast(3), |_: &String| true, || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("temporary error".to_string())
                } else {
                    Ok("success")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("success"));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result = retry(&fast(2), |_: &String| true, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("always fails".to_string())
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3); // initial + 2 retries
    }

    #[tokio::test]
    async fn test_network_retry_skips_rejections() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result: Result<(), RestError> = network_retry(&fast(3), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(RestError::new(409, "23505", "duplicate key value"))
            }
        })
        .await;

        assert_eq!(result.unwrap_err().status(), 409);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_network_retry_retries_transport_errors() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result = network_retry(&fast(2), || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(RestError::transport("connection refused"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_delay_growth_and_cap() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0)
            .with_max_delay(Duration::from_secs(1));

        assert_eq!(config.delay_for(0), Duration::from_millis(100));
        assert_eq!(config.delay_for(1), Duration::from_millis(200));
        assert_eq!(config.delay_for(2), Duration::from_millis(400));
        assert_eq!(config.delay_for(10), Duration::from_secs(1));
    }

    #[test]
    fn test_none_policy() {
        assert_eq!(RetryConfig::none().max_retries, 0);
    }
}
