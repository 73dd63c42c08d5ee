// Exponential backoff retry for provider calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    // Retries beyond the first attempt, so an operation runs at most
    // max_retries + 1 times.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

// Delay inserted after the (retry_attempt + 1)-th failed attempt, capped at
// max_backoff_ms.
pub fn calculate_backoff(retry_attempt: u32, config: &RetryConfig) -> Duration {
    let backoff_ms = (config.initial_backoff_ms as f64
        * config.backoff_multiplier.powi(retry_attempt as i32))
    .min(config.max_backoff_ms as f64);

    Duration::from_millis(backoff_ms as u64)
}

// Runs `f` until it succeeds or the attempt budget is spent. Every failure
// is retried the same way regardless of its kind. The observer sees each
// non-final failure with its 1-based attempt number; the final failure is
// returned as-is, never wrapped.
pub async fn with_backoff<T, E, F, Fut, O>(
    config: &RetryConfig,
    mut observer: O,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    O: FnMut(&E, u32),
{
    let max_attempts = config.max_retries + 1;
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts {
                    return Err(err);
                }
                observer(&err, attempt);
                sleep(calculate_backoff(attempt - 1, config)).await;
                attempt += 1;
            }
        }
    }
}
