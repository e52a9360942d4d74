use crate::error::{ProviderError, ProviderResult};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Awaits one provider call, failing it with [`ProviderError::Timeout`] after `limit`.
pub(crate) async fn call<T, F>(operation: &'static str, limit: Duration, request: F) -> ProviderResult<T>
where
    F: Future<Output = ProviderResult<T>>,
{
    match tokio::time::timeout(limit, request).await {
        Ok(Ok(value)) => {
            debug!(operation, "provider call succeeded");
            Ok(value)
        }
        Ok(Err(e)) => {
            warn!(operation, error = %e, "provider call failed");
            Err(e)
        }
        Err(_) => {
            warn!(operation, ?limit, "provider call timed out");
            Err(ProviderError::Timeout(limit))
        }
    }
}
