//! Bounded retry with exponential backoff.
//!
//! Used only at the process boundary (e.g. connecting to storage at startup).
//! Atomic loyalty operations are never retried through this helper.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use crate::config::RetrySettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            // backon counts retries, not attempts
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
            .with_jitter()
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.min_delay_ms),
            Duration::from_millis(settings.max_delay_ms),
        )
    }
}

/// Runs `op` until it succeeds, `is_retryable` rejects the error, or the
/// policy's attempts are used up. The last error is returned.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    op_name: &str,
    is_retryable: P,
    op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    op.retry(policy.backoff())
        .sleep(tokio::time::sleep)
        .when(|e: &E| is_retryable(e))
        .notify(|err: &E, delay: Duration| {
            warn!("{} failed, retrying in {:?}: {}", op_name, delay, err);
        })
        .await
}
