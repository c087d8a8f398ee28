//! Typed stores for the two MVCC tables, layered over a [`ColumnStore`].
//!
//! [`ColumnStore`]: crate::store::ColumnStore

pub mod entity_version;
pub mod log_entry;

pub use entity_version::EntityVersionStore;
pub use log_entry::LogEntryStore;

use crate::error::EngineError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Runs one store call under the configured execution timeout.
pub(crate) async fn bounded<T, F>(
    timeout: Duration,
    operation: &'static str,
    call: F,
) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, EngineError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            warn!(operation, timeout_ms, "store call timed out");
            Err(EngineError::StoreTimeout {
                operation,
                timeout_ms,
            })
        }
    }
}

pub(crate) fn require_limit(limit: usize) -> Result<(), EngineError> {
    if limit == 0 {
        return Err(EngineError::Validation(
            "range limit must be greater than 0".into(),
        ));
    }
    Ok(())
}
