use crate::error::{PaymentError, Result};
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_CONFLICT_ATTEMPTS: u32 = 5;

/// Re-runs `op` while it fails with `ConcurrencyConflict`, up to `max_attempts`
/// times in total, with a short linear backoff between attempts.
///
/// `op` must redo the whole read-check-write cycle on each call; any other
/// error is returned immediately.
pub async fn retry_on_conflict<T, F, Fut>(max_attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Err(PaymentError::ConcurrencyConflict(key)) if attempt < max_attempts => {
                tracing::debug!(key = %key, attempt, "retrying after concurrency conflict");
                tokio::time::sleep(Duration::from_millis(5 * u64::from(attempt))).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
