//! Bounded fixed-delay retry for fallible upstream operations.
//! No jitter, no backoff — a failed attempt waits the configured delay and
//! tries again, up to the attempt cap.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Run `op` up to `max_attempts` times with `delay_secs` between attempts.
/// Returns the first success, or the error from the final attempt.
pub async fn with_retry<T, F, Fut>(
    label: &str,
    max_attempts: u32,
    delay_secs: u64,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!("⚠️ Attempt {attempt}/{max_attempts} failed for {label}: {e}");
                if attempt >= max_attempts {
                    return Err(e);
                }
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemoClawError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_exhausts_attempts_and_keeps_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry("doomed", 3, 0, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(MemoClawError::Upstream(format!("boom {n}"))) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("boom 3"));
    }

    #[tokio::test]
    async fn test_returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry("flaky", 5, 0, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(MemoClawError::Upstream("not yet".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_clamps_to_one() {
        let calls = AtomicU32::new(0);
        let result = with_retry("clamped", 0, 0, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
