//! # Cache Error Types
//!
//! Error taxonomy for the offline cache and downloader.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    // ========================================================================
    // Transfer Errors
    // ========================================================================
    /// Signing call or transfer failed to connect, timed out, or terminated
    /// with a retryable status.
    #[error("Network error: {0}")]
    Network(String),

    /// Downloaded file failed verification (zero-byte or size mismatch).
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// Requested object does not exist remotely.
    #[error("Remote object not found: {0}")]
    NotFound(String),

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// Eviction could not bring disk usage under the configured cap.
    #[error("Cache storage full")]
    StorageFull,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Failure in a platform bridge (filesystem, key-value store).
    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    /// Catch-all for unexpected failures.
    #[error("Cache error: {0}")]
    Unknown(String),
}

impl CacheError {
    /// Map to the stable kind reported across the subsystem boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::Network(_) => ErrorKind::Network,
            CacheError::Integrity(_) => ErrorKind::Integrity,
            CacheError::NotFound(_) => ErrorKind::NotFound,
            CacheError::StorageFull => ErrorKind::StorageFull,
            CacheError::Bridge(_) | CacheError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Returns `true` if the downloader should retry after this error.
    ///
    /// `StorageFull` cannot be fixed by retrying and `NotFound` would repeat
    /// the same 404; everything else is treated as transient.
    pub fn should_retry(&self) -> bool {
        !matches!(self, CacheError::StorageFull | CacheError::NotFound(_))
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(self, CacheError::Network(_))
    }
}

/// Stable error classification surfaced in result payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Integrity,
    StorageFull,
    NotFound,
    Unknown,
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
