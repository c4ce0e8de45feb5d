//! Streaming Transfer Abstraction
//!
//! The single network primitive the cache driver consumes: stream a remote
//! URL into a local file, reporting progress and honoring cancellation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// A request to stream one remote object to disk.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl TransferRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Terminal result of a transfer.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// HTTP status the server terminated with
    pub status: u16,
    /// Bytes actually written to the destination file
    pub bytes_written: u64,
}

impl TransferOutcome {
    /// Check if the terminal status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Progress observer passed into the transfer call.
///
/// Invoked from the transfer's own task; implementations must be cheap and
/// non-blocking. At most one update is in flight per transfer at any time.
pub trait TransferObserver: Send + Sync {
    fn on_progress(&self, bytes_written: u64, bytes_expected: Option<u64>);
}

/// Streaming file transfer trait
///
/// Implementations stream the response body straight to `dest`, never
/// buffering the whole object in memory, and must stop promptly when the
/// cancellation token fires, releasing the file handle before returning so
/// the caller can delete the partial file.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::transfer::{FileTransferClient, TransferRequest};
/// use tokio_util::sync::CancellationToken;
///
/// async fn fetch(client: &dyn FileTransferClient, url: &str) -> Result<()> {
///     let outcome = client
///         .download_to_file(
///             TransferRequest::new(url),
///             std::path::Path::new("/tmp/object.bin.download"),
///             None,
///             CancellationToken::new(),
///         )
///         .await?;
///     assert!(outcome.is_success());
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait FileTransferClient: Send + Sync {
    /// Stream `request.url` into `dest`
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Cancelled` when the token fires mid-transfer,
    /// and `BridgeError::OperationFailed` on connection or stream errors.
    /// A non-2xx terminal status is NOT an error at this layer; it is
    /// reported through [`TransferOutcome::status`] so the caller can apply
    /// its own policy.
    async fn download_to_file(
        &self,
        request: TransferRequest,
        dest: &Path,
        observer: Option<Arc<dyn TransferObserver>>,
        cancel: CancellationToken,
    ) -> Result<TransferOutcome>;
}
