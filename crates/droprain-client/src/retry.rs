//! Fixed-backoff retry and timeout helpers for backend calls.

use std::future::Future;
use std::time::Duration;

use droprain_store::{BackendError, BackendResult};

use crate::error::ClientError;

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Live score writes during play.
    pub const LIVE: RetryPolicy = RetryPolicy {
        attempts: 3,
        delay: Duration::from_millis(300),
    };

    /// The end-of-game save.
    pub const FINAL: RetryPolicy = RetryPolicy {
        attempts: 5,
        delay: Duration::from_millis(1000),
    };

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempts run out.  Returns the last error on failure.
    pub async fn run<T, F, Fut>(&self, label: &'static str, mut op: F) -> BackendResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    tracing::warn!(
                        op = label,
                        attempt,
                        remaining = self.attempts - attempt,
                        error = %e,
                        "backend call failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Race `fut` against `limit`, mapping expiry to [`ClientError::Timeout`].
pub async fn with_timeout<T, Fut>(label: &'static str, limit: Duration, fut: Fut) -> Result<T, ClientError>
where
    Fut: Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(ClientError::from),
        Err(_) => Err(ClientError::Timeout {
            op: label,
            ms: limit.as_millis() as u64,
        }),
    }
}
