//! One retry policy shared by both generators.

use std::future::Future;
use std::time::Duration;

use metrics::counter;
use tokio_util::sync::CancellationToken;

use crate::error::GenerationError;
use crate::metrics::LLM_RETRIES_TOTAL;

/// Exponential backoff: attempt `n` (0-based) that fails with a retryable
/// error waits `base_delay * 2^n` before attempt `n + 1`.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub retryable: fn(&GenerationError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            retryable: GenerationError::is_retryable,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        retryable: fn(&GenerationError) -> bool,
    ) -> Self {
        Self {
            max_retries,
            base_delay,
            retryable,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay after the failed attempt `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }

    /// Drive `op` until it succeeds, fails non-retryably, or attempts run out.
    /// On exhaustion the last observed error is returned.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, GenerationError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) if (self.retryable)(&e) && attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        target: "analyze",
                        label,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retryable generation failure; backing off"
                    );
                    counter!(LLM_RETRIES_TOTAL).increment(1);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
