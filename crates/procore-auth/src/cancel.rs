//! Cancellation helper shared by every suspension point

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Run `fut` unless `cancel` fires first, in which case the future is dropped
/// and `Error::Cancelled` is returned. A token that is already cancelled wins
/// without polling `fut`.
pub async fn with_cancel<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
