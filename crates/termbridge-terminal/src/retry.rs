/// Bounded fixed-delay retry helper
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Run `attempt` up to `max_attempts` times with `delay` between attempts,
/// returning the first success or the last failure.
pub async fn retry_with_delay<T, F, Fut>(
    what: &str,
    max_attempts: usize,
    delay: Duration,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    debug_assert!(max_attempts > 0);
    let mut last_err = None;

    for n in 1..=max_attempts {
        match attempt().await {
            Ok(value) => {
                if n > 1 {
                    debug!("{what} succeeded on attempt {n}/{max_attempts}");
                }
                return Ok(value);
            }
            Err(e) => {
                debug!("{what} attempt {n}/{max_attempts} failed: {e:#}");
                last_err = Some(e);
                if n < max_attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{what} failed with no attempts made")))
}
