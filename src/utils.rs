use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Retries `operation` up to `max_retries` extra times with exponential
/// backoff starting at `base_delay`.
///
/// Only for idempotent reads. Anything that signs or spends is never
/// passed through here.
pub async fn retry_async<F, Fut, T, E>(
    label: &str,
    mut operation: F,
    max_retries: u32,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries => {
                warn!("{} failed on attempt {}: {}", label, attempt + 1, e);
                sleep(base_delay * 2u32.pow(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<u32, String> = retry_async(
            "flaky",
            move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(format!("attempt {n}"))
                } else {
                    Ok(n)
                }
            },
            3,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), String> = retry_async(
            "broken",
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            },
            2,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(result, Err("down".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
