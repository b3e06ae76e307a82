use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// First backoff interval; doubles after every failed attempt, no jitter.
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum RetryError<E: fmt::Debug + fmt::Display> {
    #[error("operation cancelled before completion")]
    Cancelled,

    #[error("retries exhausted: {0}")]
    Exhausted(E),
}

/// Run `op` up to `max_attempts` times, sleeping 100ms, 200ms, 400ms, ...
/// between failed attempts. The token is checked before every attempt
/// (including the first) and while sleeping; once cancelled, `op` is never
/// invoked again. A zero `max_attempts` is treated as one.
pub async fn retry_with_backoff<T, E, F, Fut>(
    cancel: &CancellationToken,
    max_attempts: u32,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: fmt::Debug + fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = max_attempts.max(1);
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 1;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                log::warn!("Operation failed (attempt {attempt}/{attempts}): {err}");
                if attempt == attempts {
                    return Err(RetryError::Exhausted(err));
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff *= 2;
        attempt += 1;
    }
}

/// Child token that cancels itself after `after`, or when the parent does.
pub fn deadline_token(parent: &CancellationToken, after: Duration) -> CancellationToken {
    let child = parent.child_token();
    let timer = child.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(after) => timer.cancel(),
            _ = timer.cancelled() => {}
        }
    });
    child
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_returns_first_success() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let result: Result<&str, RetryError<&str>> =
            retry_with_backoff(&CancellationToken::new(), 3, || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok("ok")
                }
            })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let result: Result<&str, RetryError<&str>> =
            retry_with_backoff(&CancellationToken::new(), 3, || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("boom")
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invokes_at_most_max_attempts() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let start = tokio::time::Instant::now();
        let result: Result<(), RetryError<&str>> =
            retry_with_backoff(&CancellationToken::new(), 3, || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("nope")
                }
            })
            .await;
        assert!(matches!(result, Err(RetryError::Exhausted("nope"))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // 100ms + 200ms between the three attempts, nothing after the last
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_clamps_to_one() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let result: Result<(), RetryError<&str>> =
            retry_with_backoff(&CancellationToken::new(), 0, || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("still fails")
                }
            })
            .await;
        assert!(matches!(result, Err(RetryError::Exhausted("still fails"))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_token_skips_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let result: Result<(), RetryError<&str>> = retry_with_backoff(&cancel, 3, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("never reached")
            }
        })
        .await;
        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let killer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cancel.cancel();
            })
        };
        let result: Result<(), RetryError<&str>> = retry_with_backoff(&cancel, 5, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("down")
            }
        })
        .await;
        killer.await.unwrap();
        assert!(matches!(result, Err(RetryError::Cancelled)));
        // cancelled mid-way through the first 100ms backoff
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_token_fires() {
        let parent = CancellationToken::new();
        let deadline = deadline_token(&parent, Duration::from_secs(5));
        assert!(!deadline.is_cancelled());
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(deadline.is_cancelled());
        // parent is untouched
        assert!(!parent.is_cancelled());
    }
}
