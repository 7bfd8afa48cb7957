//! Async utilities and patterns
//!
//! Provides retry/backoff policy, cancellation-aware waiting, and ordered fan-out

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: usize,
    /// Initial delay between retries in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Backoff multiplier (exponential backoff)
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A policy with no delay between attempts
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let base = (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_delay_ms as f64).max(0.0);

        let actual = if self.jitter {
            let jitter_factor = 0.1;
            let jitter = (fastrand::f64() - 0.5) * 2.0 * jitter_factor;
            capped * (1.0 + jitter)
        } else {
            capped
        };

        Duration::from_millis(actual as u64)
    }
}

/// Retry an async operation with exponential backoff
pub async fn retry_async<F, T, E>(
    operation: F,
    config: RetryConfig,
    operation_name: &str,
) -> Result<T, E>
where
    F: Fn() -> BoxFuture<'static, Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        debug!(
            operation = operation_name,
            attempt = attempt,
            max_attempts = config.max_attempts,
            "Attempting operation"
        );

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                if attempt >= config.max_attempts {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        error = %error,
                        "Operation failed after all retry attempts"
                    );
                    return Err(error);
                }

                let delay = config.delay_for_attempt(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );

                sleep(delay).await;
            }
        }
    }
}

/// Await a future unless the token fires first.
///
/// Returns `None` when cancelled; the future is dropped, which aborts any
/// in-flight work it owns.
pub async fn run_cancellable<F>(token: &CancellationToken, future: F) -> Option<F::Output>
where
    F: Future,
{
    if token.is_cancelled() {
        return None;
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        output = future => Some(output),
    }
}

/// Sleep for `duration`, returning `false` if cancelled before it elapsed
pub async fn sleep_cancellable(duration: Duration, token: &CancellationToken) -> bool {
    run_cancellable(token, sleep(duration)).await.is_some()
}

/// Run `processor` over `items` with at most `max_concurrent` in flight.
///
/// Output order matches input order.
pub async fn fan_out_ordered<T, R, F, Fut>(
    items: Vec<T>,
    max_concurrent: usize,
    processor: F,
) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items)
        .map(processor)
        .buffered(max_concurrent.max(1))
        .collect::<Vec<_>>()
        .await
}
