use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

/// How an error should be treated by the backoff loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// 429 responses: back off the longest
    RateLimit,
    /// 5xx responses: medium backoff
    Server,
    /// Network timeout - retry with short delays
    Timeout,
    /// Everything else - don't retry
    Fatal,
}

/// Configuration for retry behavior. Each class starts from its own base
/// delay and doubles per attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_retries: u32,
    /// Base delay for rate-limit errors (milliseconds)
    pub rate_limit_base_ms: u64,
    /// Base delay for server errors (milliseconds)
    pub server_base_ms: u64,
    /// Base delay for timeouts (milliseconds)
    pub timeout_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_base_ms: 500,
            server_base_ms: 300,
            timeout_base_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-indexed), or `None` for
    /// non-retryable classes.
    fn delay_for(&self, attempt: u32, class: RetryClass) -> Option<Duration> {
        let base_ms = match class {
            RetryClass::RateLimit => self.rate_limit_base_ms,
            RetryClass::Server => self.server_base_ms,
            RetryClass::Timeout => self.timeout_base_ms,
            RetryClass::Fatal => return None,
        };
        Some(Duration::from_millis(base_ms << attempt.min(10)))
    }
}

/// Retry an async operation with classified exponential backoff.
///
/// `classify` decides per error whether and how aggressively to retry;
/// `RetryClass::Fatal` errors are returned immediately.
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    policy: &RetryPolicy,
    classify: impl Fn(&E) -> RetryClass,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("Operation succeeded after {} retry attempts", attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                let class = classify(&e);

                let Some(delay) = policy.delay_for(attempt, class) else {
                    error!("Operation failed with non-retryable error: {}", e);
                    return Err(e);
                };

                if attempt >= policy.max_retries {
                    error!(
                        "Operation failed after {} attempts (max retries exhausted): {}",
                        attempt + 1,
                        e
                    );
                    return Err(e);
                }

                warn!(
                    "Operation failed (attempt {}/{}): {} - retrying in {}ms ({:?})",
                    attempt + 1,
                    policy.max_retries + 1,
                    e,
                    delay.as_millis(),
                    class
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
