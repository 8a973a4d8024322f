//! Fixed-delay retry loop shared by the classifier and the Gmail calls.

use shared_types::RetryPolicy;
use std::fmt::Display;
use std::future::Future;

/// All attempts failed; carries the error from the final attempt
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `op` until it succeeds or the policy's attempts are used up.
///
/// Sleeps `policy.delay()` between attempts, never after the last one.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!("{} succeeded on attempt {}", operation, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    "Error during {} (attempt {}/{}): {}",
                    operation,
                    attempt,
                    max_attempts,
                    e
                );
                tokio::time::sleep(policy.delay()).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    "{} failed after {} attempt(s): {}",
                    operation,
                    max_attempts,
                    e
                );
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: e,
                });
            }
        }
    }
}

/// Convenience wrapper for `anyhow` call sites
pub async fn retry_anyhow<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    op: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    retry(policy, operation, op).await.map_err(|exhausted| {
        exhausted.last_error.context(format!(
            "{} failed after {} attempt(s)",
            operation, exhausted.attempts
        ))
    })
}
