pub mod memory_writer;
pub mod orchestrator;
pub mod retriever;
pub mod user;

use std::future::Future;
use std::time::Duration;

use crate::error::{QueryPilotError, Result};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Bound an upstream provider call. Elapsed maps to an http error so callers
/// see one failure shape for transport faults and hangs alike.
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| QueryPilotError::Http(format!("{what} request timed out")))?
}
