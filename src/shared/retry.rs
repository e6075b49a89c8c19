//! Bounded retry for transient adapter failures.

use crate::domain::Transient;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Base delay; attempt `n` waits `backoff * n` before the next try.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Single attempt, no waiting. Used by tests and dry runs.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// policy's attempts are used up. Returns the last error.
pub async fn retry_transient<T, E, F, Fut>(policy: RetryPolicy, what: &str, op: F) -> Result<T, E>
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_if(policy, what, E::is_transient, op).await
}

/// Like `retry_transient`, with the caller deciding which errors are retried.
/// Used for calls that are not safe to repeat once the request was sent.
pub async fn retry_if<T, E, P, F, Fut>(
    policy: RetryPolicy,
    what: &str,
    retryable: P,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if retryable(&e) && attempt < policy.attempts => {
                let wait = policy.backoff * attempt;
                warn!(
                    op = what,
                    attempt,
                    max = policy.attempts,
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
