//! Bounded retry for read-only lookups.
//!
//! Only idempotent lookups go through here. Submission of a signed blob is
//! never retried automatically: whether a resubmission is safe depends on
//! ledger finality rules the caller has to judge.

use std::future::Future;
use tracing::warn;

use super::client::ClientError;
use crate::config::RetryPolicy;

/// Run `op` until it succeeds, fails permanently, or attempts run out.
///
/// Only [`ClientError::is_transient`] failures are retried, with the
/// policy's exponential backoff between attempts.
pub async fn retry_lookup<T, F, Fut>(
    policy: &RetryPolicy,
    name: &str,
    mut op: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff_after(attempt);
                warn!(
                    lookup = name,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "lookup failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
