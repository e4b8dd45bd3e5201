use std::{fmt::Debug, time::Duration};

use anyhow::{Error, Result};
use backon::{ExponentialBuilder, Retryable};
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub fn new_backoff() -> ExponentialBuilder {
    ExponentialBuilder::new()
        .with_jitter()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(10))
}

/// Backoff for calls the follower cannot make progress without. Only
/// cancellation stops it.
pub fn new_backoff_unlimited() -> ExponentialBuilder {
    new_backoff().without_max_times()
}

/// Retries `operation` until it succeeds, the backoff gives up or
/// `cancel_token` is cancelled. `action` names the call in the logs.
pub async fn retry<T, E, F, Fut>(
    operation: F,
    action: &str,
    backoff: ExponentialBuilder,
    cancel_token: CancellationToken,
) -> Result<T>
where
    E: Debug + Into<Error>,
    Fut: Future<Output = Result<T, E>>,
    F: FnMut() -> Fut,
{
    operation
        .retry(backoff)
        .notify(|e: &E, d: Duration| warn!("Retrying {} due to {:?} after {:?}", action, e, d))
        .when(|_: &E| !cancel_token.is_cancelled())
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[tokio::test]
    async fn test_retry_until_success() -> Result<()> {
        let attempts = Arc::new(AtomicUsize::new(0));
        let backoff = ExponentialBuilder::new()
            .with_min_delay(Duration::from_millis(1))
            .with_max_times(5);
        let value = retry(
            || {
                let attempts = attempts.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(anyhow::anyhow!("not yet"))
                    } else {
                        Ok(7)
                    }
                }
            },
            "count",
            backoff,
            CancellationToken::new(),
        )
        .await?;
        assert_eq!(value, 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_retry_stops_when_cancelled() {
        let cancel_token = CancellationToken::new();
        cancel_token.cancel();
        let attempts = Arc::new(AtomicUsize::new(0));
        let result: Result<()> = retry(
            || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("down"))
                }
            },
            "fail",
            new_backoff_unlimited(),
            cancel_token,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
