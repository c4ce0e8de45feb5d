//! Integrity Checker
//!
//! Dual-mode verification of local cache files. Without an expected size,
//! existence alone counts (the pre-flight "is there already a usable copy"
//! query). With an expected size, exact equality is required: a mismatch is
//! treated as corruption, the file is deleted, and the check reports false.

use bridge_traits::FileSystemAccess;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Verifier for on-disk cache files.
#[derive(Clone)]
pub struct IntegrityChecker {
    fs: Arc<dyn FileSystemAccess>,
}

impl IntegrityChecker {
    pub fn new(fs: Arc<dyn FileSystemAccess>) -> Self {
        Self { fs }
    }

    /// Verify a local file.
    ///
    /// Returns `false` when the path does not exist, or when `expected_size`
    /// is supplied and the on-disk size differs (the invalid file is deleted
    /// best-effort before returning). Filesystem errors during the check are
    /// treated as "not valid" rather than propagated; the caller's retry or
    /// sweep logic self-heals later.
    pub async fn verify(&self, path: &Path, expected_size: Option<u64>) -> bool {
        match self.fs.exists(path).await {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Existence check failed");
                return false;
            }
        }

        let Some(expected) = expected_size else {
            return true;
        };

        let actual = match self.fs.metadata(path).await {
            Ok(meta) => meta.size,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Stat failed during verification");
                return false;
            }
        };

        if actual == expected {
            debug!(path = %path.display(), size = actual, "File verified");
            return true;
        }

        warn!(
            path = %path.display(),
            expected,
            actual,
            "Size mismatch, deleting corrupt file"
        );

        if let Err(e) = self.fs.delete_file(path).await {
            warn!(path = %path.display(), error = %e, "Failed to delete corrupt file");
        }

        false
    }
}
