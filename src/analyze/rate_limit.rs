//! Process-wide token bucket shared by every outbound model call of a run.
//!
//! A GCRA limiter from `governor`: `burst` calls are free up front, after that
//! grants are spaced at the configured rate no matter how many workers wait.
//! A waiter dropped by cancellation consumes nothing.

use std::num::NonZeroU32;

use governor::{DefaultDirectRateLimiter, Quota};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("rate limiter wait cancelled")]
pub struct AcquireCancelled;

pub struct RateLimiter {
    inner: DefaultDirectRateLimiter,
}

impl RateLimiter {
    /// `rpm` sustained requests per minute, `burst` tokens available up front.
    /// Zero values are bumped to 1.
    pub fn per_minute(rpm: u32, burst: u32) -> Self {
        let rpm = NonZeroU32::new(rpm).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        Self {
            inner: governor::RateLimiter::direct(Quota::per_minute(rpm).allow_burst(burst)),
        }
    }

    /// Take a token only if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.inner.check().is_ok()
    }

    /// Wait for a token, or bail out as soon as `cancel` fires.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), AcquireCancelled> {
        if cancel.is_cancelled() {
            return Err(AcquireCancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AcquireCancelled),
            _ = self.inner.until_ready() => Ok(()),
        }
    }
}
