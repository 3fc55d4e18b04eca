use anyhow::Error;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_RETRIES: usize = 2;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 300;

/// Retries an async HTTP call, `retries` times after the first attempt,
/// sleeping `delay_ms` between attempts. `label` names the call in logs.
pub async fn with_retry<F, Fut, T>(
    label: &str,
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) if attempt > retries => return Err(Error::from(err)),
            Err(err) => {
                debug!(
                    "{}: attempt {}/{} failed: {}. Retrying...",
                    label,
                    attempt,
                    retries + 1,
                    err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
