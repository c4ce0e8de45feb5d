//! Data model for the offline cache
//!
//! Persisted records, ephemeral progress ticks, and the plain result
//! payloads handed across the UI boundary.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Suffix staging an in-progress write so a partial file is never mistaken
/// for a complete one.
pub const SIDECAR_SUFFIX: &str = ".download";

/// One file that has been downloaded into the cache.
///
/// At most one live record exists per `file_name`; re-downloads refresh the
/// size and timestamps in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedFileRecord {
    /// Stable logical key derived from the remote object path
    pub file_name: String,

    /// Absolute path of the published file
    pub local_path: String,

    /// Size on disk in bytes
    pub size_bytes: u64,

    /// Last modification time in epoch milliseconds
    pub last_modified_at_ms: i64,

    /// When the download completed, epoch milliseconds
    pub downloaded_at_ms: i64,
}

/// A temporarily valid access URL for a remote object.
///
/// Usable only while `now < expires_at_ms`; expired entries are refreshed or
/// discarded, never returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedUrlEntry {
    pub url: String,
    pub expires_at_ms: i64,
}

impl SignedUrlEntry {
    /// Check whether the entry is still usable at `now_ms`.
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at_ms
    }
}

/// Ephemeral per-transfer progress, overwritten in place per tick.
///
/// Exists only while a transfer is in flight; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub file_name: String,
    pub bytes_written: u64,
    pub bytes_expected: Option<u64>,
    pub updated_at_ms: i64,
}

/// Result of a `download()` call.
///
/// Always returned, never thrown: calling UI code branches on `success` and
/// on the `from_cache`/`after_failure` flags to tell a fresh download from a
/// stale substitute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub success: bool,
    pub file_name: String,
    pub local_path: Option<String>,

    /// The returned file came from the cache, not a fresh transfer
    pub from_cache: bool,

    /// The cached copy was substituted after a failed fresh download and may
    /// be outdated
    pub after_failure: bool,

    pub error_kind: Option<ErrorKind>,

    /// Extra attempts performed beyond the first
    pub retry_count: u32,
}

impl DownloadOutcome {
    pub(crate) fn fresh(record: &CachedFileRecord, retry_count: u32) -> Self {
        Self {
            success: true,
            file_name: record.file_name.clone(),
            local_path: Some(record.local_path.clone()),
            from_cache: false,
            after_failure: false,
            error_kind: None,
            retry_count,
        }
    }

    pub(crate) fn cached(file_name: &str, local_path: &str, after_failure: bool) -> Self {
        Self {
            success: true,
            file_name: file_name.to_string(),
            local_path: Some(local_path.to_string()),
            from_cache: true,
            after_failure,
            error_kind: None,
            retry_count: 0,
        }
    }

    pub(crate) fn failed(file_name: &str, error_kind: ErrorKind, retry_count: u32) -> Self {
        Self {
            success: false,
            file_name: file_name.to_string(),
            local_path: None,
            from_cache: false,
            after_failure: false,
            error_kind: Some(error_kind),
            retry_count,
        }
    }
}

/// One on-disk cache entry as reported by `list()`.
///
/// `size_bytes` is 0 when no metadata record was available and the size was
/// not eagerly computed; callers may lazily stat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub size_bytes: u64,
}

/// Result of `open()` / `delete()` calls across the UI boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpResult {
    pub success: bool,
    pub error: Option<String>,
}

impl OpResult {
    pub(crate) fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub(crate) fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

/// Derive the stable cache file name for a remote object path.
///
/// Deterministic so repeated requests for the same content map to the same
/// record and the same on-disk path. Path separators and non-portable
/// characters collapse to underscores; the extension is preserved.
pub fn cache_file_name(remote_path: &str) -> String {
    let trimmed = remote_path.trim_matches('/');

    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Sidecar path for an in-progress download of `final_name`.
pub fn sidecar_name(final_name: &str) -> String {
    format!("{}{}", final_name, SIDECAR_SUFFIX)
}

/// Check whether a file name denotes an in-progress sidecar.
pub fn is_sidecar(name: &str) -> bool {
    name.ends_with(SIDECAR_SUFFIX)
}
