//! Retry logic with linear backoff
//!
//! `RetryPolicy` wraps one fallible async operation, typically a network call
//! plus response decoding. The first attempt runs immediately; after a failed
//! attempt `n` the policy sleeps `base_delay * n` before trying again, until
//! `max_attempts` have been made.
//!
//! Every error is retried the same way. A malformed response body is treated
//! exactly like a refused connection: the policy has no notion of a
//! permanent error.

use std::fmt::{Debug, Display};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Retry policy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Delay unit; the wait after failed attempt `n` is `base_delay * n`
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

/// Successful result of a retried operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    /// Value produced by the successful attempt
    pub value: T,

    /// Number of attempts made, including the successful one
    pub attempts: u32,
}

/// Every attempt failed
#[derive(Error, Debug)]
#[error("Operation '{operation}' failed after {attempts} attempt(s): {last_error}")]
pub struct RetryError<E> {
    /// Operation name, for diagnostics
    pub operation: String,

    /// Number of attempts made
    pub attempts: u32,

    /// Error from the final attempt
    pub last_error: E,
}

/// Bookkeeping for one `execute` call; dropped when the call resolves
#[derive(Debug, Default)]
struct RetryState {
    attempt: u32,
    last_error: Option<String>,
    next_delay: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Create a policy with fast retries (for testing)
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
        }
    }

    /// Effective attempt budget; a zero budget still runs the operation once
    pub fn attempt_budget(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the given (1-based) attempt has failed
    pub fn backoff_after(&self, failed_attempt: u32) -> Duration {
        self.base_delay.saturating_mul(failed_attempt)
    }

    /// Execute an async operation with retry logic
    ///
    /// # Arguments
    ///
    /// * `operation_name` - Name of the operation (for logging)
    /// * `operation` - Produces a fresh future for every attempt
    ///
    /// # Returns
    ///
    /// The value and the number of attempts it took, or the final error once
    /// the attempt budget is spent
    pub async fn execute<F, Fut, T, E>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<Retried<T>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display + Debug,
    {
        let budget = self.attempt_budget();
        let mut state = RetryState::default();

        loop {
            state.attempt += 1;
            debug!(
                "Attempt {}/{} for operation: {}",
                state.attempt, budget, operation_name
            );

            match operation().await {
                Ok(value) => {
                    if let Some(previous) = state.last_error.take() {
                        info!(
                            "Operation '{}' succeeded on attempt {} (previous error: {})",
                            operation_name, state.attempt, previous
                        );
                    }
                    return Ok(Retried {
                        value,
                        attempts: state.attempt,
                    });
                }
                Err(e) => {
                    if state.attempt >= budget {
                        warn!(
                            "Operation '{}' failed after {} attempts: {}",
                            operation_name, state.attempt, e
                        );
                        return Err(RetryError {
                            operation: operation_name.to_string(),
                            attempts: state.attempt,
                            last_error: e,
                        });
                    }

                    state.next_delay = self.backoff_after(state.attempt);
                    warn!(
                        "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                        operation_name, state.attempt, budget, e, state.next_delay
                    );
                    state.last_error = Some(e.to_string());
                    sleep(state.next_delay).await;
                }
            }
        }
    }
}
