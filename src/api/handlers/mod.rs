//! Route handlers.

mod records;
mod system;

pub use records::{create_record, delete_record, list_records, update_record, view_record};
pub use system::{HealthResponse, health};

use super::error::ApiError;
use tracing::error;

/// Run storage work off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!(error = %e, "Blocking task failed");
        ApiError::internal()
    })?
}
