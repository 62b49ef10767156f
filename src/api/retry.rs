//! Retry policy shared by every caller that retries a request.
//!
//! Attempts run strictly one after another; the policy sleeps between them
//! and hands back the last error once attempts run out or the predicate
//! declines to retry.

use super::ApiError;
use rand::Rng;
use std::{fmt, future::Future, time::Duration};
use tokio::time::sleep;
use tracing::warn;

/// Delay before retrying after a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * 2^(attempt - 1)`, capped at `max`. With `jitter` the delay is
    /// scaled down to 70-90% of that value.
    Exponential {
        base: Duration,
        max: Duration,
        jitter: bool,
    },
}

impl Backoff {
    /// Delay to wait after attempt number `attempt` (1-based) failed.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max, jitter } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                let delay = base.saturating_mul(factor).min(max);
                if jitter {
                    let percent = rand::thread_rng().gen_range(70..90);
                    delay * percent / 100
                } else {
                    delay
                }
            }
        }
    }
}

pub struct RetryPolicy<E = ApiError> {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Whether an error is worth another attempt.
    pub retry_if: fn(&E) -> bool,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RetryPolicy<E> {}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy<ApiError> {
    pub const UNAUTHORIZED_ATTEMPTS: u32 = 3;
    pub const UNAUTHORIZED_DELAY: Duration = Duration::from_millis(200);

    /// Three attempts, 200ms apart, retrying only on `401`.
    ///
    /// The delay gives a refresh performed by the relay time to become
    /// visible to the repeated request.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self {
            max_attempts: Self::UNAUTHORIZED_ATTEMPTS,
            backoff: Backoff::Fixed(Self::UNAUTHORIZED_DELAY),
            retry_if: ApiError::is_unauthorized,
        }
    }
}

impl<E: fmt::Display> RetryPolicy<E> {
    /// Run `operation` until it succeeds, the predicate declines, or
    /// `max_attempts` is reached. `operation` receives the 1-based attempt
    /// number.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && (self.retry_if)(&err) => {
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after error: {err}"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
