//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::ToolkitError;

/// Wrap a future with a timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, ToolkitError>>,
) -> Result<T, ToolkitError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ToolkitError::Timeout(duration.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn elapsed_deadline_maps_to_timeout_error() {
        let result: Result<(), ToolkitError> = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(ToolkitError::Timeout(50))));
    }

    #[tokio::test]
    async fn inner_result_passes_through() {
        let value = with_timeout(Duration::from_secs(1), async { Ok(7) })
            .await
            .expect("future should finish in time");
        assert_eq!(value, 7);
    }
}
