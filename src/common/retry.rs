// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry an async operation with linear backoff.
///
/// After failed attempt `n` the retrier sleeps `base_delay * n` before trying
/// again. Returns the first success, or the last error once `attempts` is used up.
pub async fn retry_linear<F, Fut, T, E>(
    label: &str,
    mut op: F,
    attempts: usize,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < attempts => {
                let delay = base_delay.saturating_mul(attempt as u32);
                tracing::warn!(
                    target: "retry",
                    op = label,
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed; backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    #[tokio::test]
    async fn retries_until_success() {
        let counter = AtomicUsize::new(0);
        let res: Result<u32, String> = retry_linear(
            "test",
            |_| {
                let current = counter.fetch_add(1, Ordering::Relaxed);
                async move {
                    if current < 2 {
                        Err("boom".to_string())
                    } else {
                        Ok(7)
                    }
                }
            },
            4,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(res.unwrap(), 7);
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn returns_last_error_after_exhaustion() {
        let res: Result<(), String> = retry_linear(
            "test",
            |attempt| async move { Err(format!("fail #{attempt}")) },
            3,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(res.unwrap_err(), "fail #3");
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_linearly() {
        let started = Instant::now();
        let _: Result<(), String> = retry_linear(
            "test",
            |_| async { Err("nope".to_string()) },
            3,
            Duration::from_secs(2),
        )
        .await;
        // 2s after the first failure, 4s after the second, none after the last.
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }
}
