use std::future::Future;
use std::time::Duration;

use tracing::error;

use crate::error::ProvisioningError;

/// Bounds `run` by `limit`; expiry is fatal regardless of how far the run got.
pub async fn run_with_watchdog<T, F>(limit: Duration, run: F) -> Result<T, ProvisioningError>
where
    F: Future<Output = Result<T, ProvisioningError>>,
{
    match tokio::time::timeout(limit, run).await {
        Ok(result) => result,
        Err(_) => {
            error!(limit_secs = limit.as_secs(), "run watchdog expired");
            Err(ProvisioningError::WatchdogExpired(limit.as_secs()))
        }
    }
}
