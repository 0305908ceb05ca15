//! Fixed-attempt, fixed-delay retry, cancellation-aware.
//!
//! Retries the whole operation up to `attempts` times with a flat delay
//! between tries, bailing out immediately if cancellation fires or if the
//! error itself isn't worth retrying (a caller-supplied classifier decides).

use std::future::Future;
use std::time::Duration;

use tokio::select;
use tokio_util::sync::CancellationToken;

/// Runs `op` up to `attempts` times (so `attempts == 1` means "no retry"),
/// sleeping `delay` between failures. `should_retry` is consulted on every
/// failure; once it returns `false` the loop stops immediately, without
/// sleeping or spending any remaining attempts. Returns the last error if
/// every attempt fails (or is deemed non-retryable).
pub async fn retry<F, Fut, T, E>(
    attempts: u32,
    delay: Duration,
    cancel: &CancellationToken,
    should_retry: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut last_err = None;

    for attempt in 0..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = should_retry(&err);
                last_err = Some(err);
                if !retryable {
                    break;
                }
                if attempt + 1 < attempts {
                    select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    Err(last_err.expect("at least one attempt always runs"))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn always_retryable(_: &&str) -> bool {
        true
    }

    #[tokio::test]
    async fn succeeds_without_retrying_when_the_first_attempt_works() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry(
            3,
            Duration::from_millis(1),
            &CancellationToken::new(),
            always_retryable,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            },
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_up_to_the_configured_attempt_count() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry(
            3,
            Duration::from_millis(1),
            &CancellationToken::new(),
            always_retryable,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("boom")
            },
        )
        .await;

        assert_eq!(result, Err("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_on_a_later_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry(
            3,
            Duration::from_millis(1),
            &CancellationToken::new(),
            always_retryable,
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 { Err("not yet") } else { Ok(7) }
            },
        )
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_retrying_once_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry(5, Duration::from_millis(1), &cancel, always_retryable, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("boom")
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_retry_a_non_retryable_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry(
            5,
            Duration::from_millis(1),
            &CancellationToken::new(),
            |_: &&str| false,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("client error")
            },
        )
        .await;

        assert_eq!(result, Err("client error"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
