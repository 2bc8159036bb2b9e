//! Bounded retries with linear backoff.

use std::fmt::Display;
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::FetchError;

pub const DEFAULT_RETRY_ATTEMPTS: NonZeroU32 = NonZeroU32::new(3).unwrap();
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

/// How often and how patiently a request is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub attempts: NonZeroU32,
    /// Delay after the first failed attempt; grows linearly with each attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Backoff after the (1-based) `attempt` failed.
    ///
    /// Saturates at [Duration::MAX] instead of overflowing.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(attempt)
            .unwrap_or(Duration::MAX)
    }
}

/// Classification of a single attempt.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Terminal success.
    Done(T),
    /// Terminal failure, not retried.
    Fatal(E),
    /// HTTP 429, retried.
    RateLimited,
    /// No response reached us, retried.
    Unreachable(E),
}

/// Why [with_retries] gave up.
#[derive(Debug, PartialEq)]
pub enum RetryFailure<E> {
    Fatal(E),
    /// The last attempt could not reach the server.
    Unreachable(E),
    /// The last attempt was rate limited.
    RateLimited { attempts: u32 },
}

impl From<RetryFailure<FetchError>> for FetchError {
    fn from(failure: RetryFailure<FetchError>) -> Self {
        match failure {
            RetryFailure::Fatal(err) | RetryFailure::Unreachable(err) => err,
            RetryFailure::RateLimited { attempts } => FetchError::RetriesExhausted { attempts },
        }
    }
}

/// Run `attempt` until it produces a terminal outcome or the policy's
/// attempts are used up.
///
/// `attempt` receives the 1-based attempt number.
/// Retryable outcomes sleep for [RetryPolicy::delay_for] before the next
/// attempt. No delay follows the final attempt.
pub async fn with_retries<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut attempt: F,
) -> Result<T, RetryFailure<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T, E>>,
{
    let attempts = policy.attempts.get();
    let mut failure = RetryFailure::RateLimited { attempts };

    for n in 1..=attempts {
        match attempt(n).await {
            Attempt::Done(value) => return Ok(value),
            Attempt::Fatal(err) => return Err(RetryFailure::Fatal(err)),
            Attempt::RateLimited => {
                warn!(attempt = n, "rate limited by catalog");
                failure = RetryFailure::RateLimited { attempts };
            },
            Attempt::Unreachable(err) => {
                warn!(attempt = n, %err, "catalog unreachable");
                failure = RetryFailure::Unreachable(err);
            },
        }

        if n < attempts {
            let delay = policy.delay_for(n);
            debug!(attempt = n, ?delay, "backing off before retrying");
            tokio::time::sleep(delay).await;
        }
    }

    Err(failure)
}
