use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Run `op` up to `max_attempts` times, retrying only when it fails with a
/// rate-limit classification. Backoff doubles after each attempt
/// (e.g. 2s, 4s, 8s). Any other error class fails immediately.
pub async fn retry_on_rate_limit<T, F, Fut>(
    max_attempts: u32,
    initial_backoff: Duration,
    op: F,
) -> AppResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut delay = initial_backoff;
    let mut attempt = 1u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(AppError::RateLimited) if attempt < max_attempts => {
                tracing::warn!(
                    "Rate limited on attempt {}/{}, backing off for {:?}",
                    attempt,
                    max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
