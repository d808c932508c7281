//! Deadline helpers shared by the transport layer.
//!
//! A zero duration means "no timeout" throughout this crate.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{ProtocolError, Result};

/// Default socket timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest timeout accepted by configuration validation
pub const MAX_TIMEOUT: Duration = Duration::from_secs(300);

/// Deadline for an operation starting now, or `None` when disabled
pub fn deadline_after(timeout: Duration) -> Option<Instant> {
    if timeout.is_zero() {
        None
    } else {
        Some(Instant::now() + timeout)
    }
}

/// Run `fut` until `deadline`, mapping expiry to [`ProtocolError::Timeout`]
pub async fn until_deadline<F, T>(fut: F, deadline: Option<Instant>) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(at) => tokio::time::timeout_at(at, fut)
            .await
            .map_err(|_| ProtocolError::Timeout)?,
        None => fut.await,
    }
}

/// Run `fut` with a timeout; zero disables it
pub async fn with_timeout_error<F, T>(fut: F, timeout: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    until_deadline(fut, deadline_after(timeout)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_timeout_disables_deadline() {
        assert!(deadline_after(Duration::ZERO).is_none());
        let value = with_timeout_error(async { Ok(7) }, Duration::ZERO).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_expired_deadline_is_timeout() {
        let result: Result<()> = with_timeout_error(
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            },
            Duration::from_millis(20),
        )
        .await;
        assert!(matches!(result, Err(ProtocolError::Timeout)));
    }
}
