//! Retry with exponential backoff

use log::debug;
use std::future::Future;
use std::time::Duration;

use crate::error::CallError;

/// Upper bound on a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How often and how patiently to retry transport failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    /// Delay before the first retry; doubles on every further retry
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        Self {
            retries,
            base_delay,
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Sleep before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's retries are used up
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, CallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.retries => {
                let delay = policy.delay_for(attempt);
                debug!(
                    "{} failed ({}), retry {}/{} in {:?}",
                    label,
                    err,
                    attempt + 1,
                    policy.retries,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_policy(retries: u32) -> RetryPolicy {
        RetryPolicy::new(retries, Duration::from_millis(1))
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(10), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_succeeds_after_two_transport_failures() {
        let calls = Cell::new(0);
        let result = retry_with_backoff(&fast_policy(3), "quai_blockNumber", || {
            calls.set(calls.get() + 1);
            let attempt = calls.get();
            async move {
                if attempt <= 2 {
                    Err(CallError::NetworkUnreachable("connection refused".into()))
                } else {
                    Ok("0x10")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("0x10"));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_protocol_error_is_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), _> = retry_with_backoff(&fast_policy(3), "quai_gasPrice", || {
            calls.set(calls.get() + 1);
            async {
                Err(CallError::RpcError {
                    code: -32000,
                    message: "rejected".into(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(CallError::RpcError { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let calls = Cell::new(0);
        let result: Result<(), _> = retry_with_backoff(&fast_policy(2), "net_peerCount", || {
            calls.set(calls.get() + 1);
            async { Err(CallError::Timeout(Duration::from_secs(10))) }
        })
        .await;

        assert!(matches!(result, Err(CallError::Timeout(_))));
        assert_eq!(calls.get(), 3);
    }
}
