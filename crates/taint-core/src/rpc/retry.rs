//! Exponential backoff with jitter for Node Client calls.
//!
//! Transient node errors (timeouts, connection resets, 5xx responses) are
//! retried with backoff rather than surfaced immediately, using the same
//! `reqwest` error shapes and `rand` for jitter.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::RpcError;

/// Retry policy knobs, mapped from the `node.max_retries`, `node.retry_base_ms`,
/// and `node.retry_cap_ms` configuration options.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub jitter: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base: Duration::from_millis(500),
            jitter: Duration::from_secs(1),
            cap: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        let capped = exp.min(self.cap);
        let jitter_ms = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
        capped + Duration::from_millis(jitter_ms)
    }
}

/// Run `op` up to `policy.max_attempts` times, backing off between attempts.
/// Only errors for which [`RpcError::is_transient`] holds are retried; any
/// other error (or the last attempt) is returned immediately.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, RpcError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, RpcError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(attempt, ?delay, error = %err, "node rpc call failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
