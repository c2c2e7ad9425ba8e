//! Bounded retry with per-attempt timeouts.
//!
//! Every remote exchange in the auth flows follows the same shape: race
//! the call against a timer, back off on failure, give up after a fixed
//! number of attempts, and never retry an error that retrying cannot
//! fix. [`retry_with_timeout`] is that shape as one parameterized
//! combinator; the session check and credential exchange configure it
//! through [`RetryPolicy`] values instead of re-implementing the loop.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure<E> {
    /// The operation settled with an error.
    Error(E),
    /// The attempt's timer fired first. The operation's future is
    /// dropped, so a late settlement can never mutate state.
    TimedOut,
}

impl<E: fmt::Display> fmt::Display for AttemptFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(e) => write!(f, "{e}"),
            Self::TimedOut => write!(f, "attempt timed out"),
        }
    }
}

/// Outcome of a retried operation that never succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The operation failed with an error classified as terminal; no
    /// further attempts were made.
    Terminal(E),
    /// Every attempt failed with a retryable error or timeout.
    Exhausted {
        /// How many attempts were made.
        attempts: u32,
        /// The failure of the final attempt.
        last: AttemptFailure<E>,
    },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminal(e) => write!(f, "terminal error: {e}"),
            Self::Exhausted { attempts, last } => {
                write!(f, "gave up after {attempts} attempts, last failure: {last}")
            }
        }
    }
}

impl<E: fmt::Display + fmt::Debug> std::error::Error for RetryError<E> {}

/// Attempt, timeout, and backoff parameters for one remote exchange.
///
/// The per-attempt timeout escalates linearly:
/// `base_timeout_ms + attempt * timeout_increment_ms`. Backoff between
/// attempts depends on how the previous attempt failed: errors and
/// timeouts each have their own pause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts. A policy always makes at least one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Timeout for the first attempt, in milliseconds.
    pub base_timeout_ms: u64,
    /// Added to the timeout on each subsequent attempt, in milliseconds.
    #[serde(default)]
    pub timeout_increment_ms: u64,
    /// Pause after an attempt that failed with an error, in milliseconds.
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    /// Pause after an attempt that timed out, in milliseconds.
    #[serde(default = "default_timeout_backoff_ms")]
    pub timeout_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_error_backoff_ms() -> u64 {
    2000
}

fn default_timeout_backoff_ms() -> u64 {
    3000
}

impl RetryPolicy {
    /// Creates a policy with the given first-attempt timeout and the
    /// default attempt cap and backoffs.
    #[must_use]
    pub fn new(base_timeout_ms: u64) -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_timeout_ms,
            timeout_increment_ms: 0,
            error_backoff_ms: default_error_backoff_ms(),
            timeout_backoff_ms: default_timeout_backoff_ms(),
        }
    }

    /// Sets the per-attempt timeout escalation.
    #[must_use]
    pub fn with_timeout_increment(mut self, increment_ms: u64) -> Self {
        self.timeout_increment_ms = increment_ms;
        self
    }

    /// Sets the attempt cap.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Returns the timeout for the 0-based attempt number.
    #[must_use]
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_timeout_ms + u64::from(attempt) * self.timeout_increment_ms)
    }

    /// Returns the pause to take after the given failure.
    #[must_use]
    pub fn backoff_for<E>(&self, failure: &AttemptFailure<E>) -> Duration {
        match failure {
            AttemptFailure::Error(_) => Duration::from_millis(self.error_backoff_ms),
            AttemptFailure::TimedOut => Duration::from_millis(self.timeout_backoff_ms),
        }
    }
}

/// Runs `operation` under `policy`.
///
/// Each attempt races a fresh future from `operation` against that
/// attempt's timeout; the loser is dropped. Errors for which
/// `is_terminal` returns true short-circuit the budget. Retries are
/// strictly sequential: the next attempt starts only after the previous
/// attempt's backoff has elapsed, and there is no pause after the final
/// attempt.
pub async fn retry_with_timeout<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    is_terminal: P,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: fmt::Display,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        let failure = match time::timeout(policy.timeout_for(attempt), operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if is_terminal(&e) => return Err(RetryError::Terminal(e)),
            Ok(Err(e)) => AttemptFailure::Error(e),
            Err(_elapsed) => AttemptFailure::TimedOut,
        };

        attempt += 1;
        if attempt >= attempts {
            return Err(RetryError::Exhausted {
                attempts,
                last: failure,
            });
        }

        let backoff = policy.backoff_for(&failure);
        tracing::debug!(
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            failure = %failure,
            "attempt failed, backing off before retry"
        );
        time::sleep(backoff).await;
    }
}
