use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::{Error, Result};

const BASE_DELAY_MS: u64 = 1000;
const MAX_DELAY_MS: u64 = 10_000;

// delay before attempt `n` (0-based): 1s doubling per attempt, capped
// at 10s.
pub fn backoff_delay(attempt: u32) -> Duration {
  let ms = BASE_DELAY_MS.saturating_mul(1u64 << attempt.min(31));
  Duration::from_millis(ms.min(MAX_DELAY_MS))
}

// Re-issues `op` while `is_transient` classifies its error as worth
// retrying, up to `max_attempts` total attempts. The last error is
// propagated unchanged once attempts are exhausted; terminal errors
// are never retried.
pub async fn with_retry<T, F, Fut>(
  max_attempts: u32,
  is_transient: impl Fn(&Error) -> bool,
  mut op: F,
) -> Result<T>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T>>,
{
  let mut attempt = 0;

  loop {
    match op().await {
      Ok(value) => return Ok(value),
      Err(err) if attempt + 1 < max_attempts && is_transient(&err) => {
        attempt += 1;
        let delay = backoff_delay(attempt);
        warn!(
          "attempt {attempt}/{max_attempts} failed ({err}), \
           retrying in {delay:?}"
        );
        tokio::time::sleep(delay).await;
      }
      Err(err) => return Err(err),
    }
  }
}
