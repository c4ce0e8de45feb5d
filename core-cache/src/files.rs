//! Public File Operations
//!
//! Read-only and mutating operations over the cache that UI collaborators
//! call directly. Like `download()`, every operation returns a plain result
//! object; nothing here throws past the subsystem boundary.

use crate::manager::ContentCacheManager;
use crate::types::{is_sidecar, FileEntry, OpResult};
use std::path::Path;
use tracing::{debug, warn};

impl ContentCacheManager {
    /// List current on-disk cache entries.
    ///
    /// Sizes come from the metadata record when one exists; otherwise a 0
    /// placeholder is reported and the caller may lazily stat. In-progress
    /// sidecars are not listed. Listing errors degrade to an empty result.
    pub async fn list(&self) -> Vec<FileEntry> {
        let paths = match self.fs.list_directory(&self.config.cache_dir).await {
            Ok(paths) => paths,
            Err(e) => {
                warn!(error = %e, "Failed to list cache directory");
                return Vec::new();
            }
        };

        let records = self.metadata.list_records().await.unwrap_or_default();

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if is_sidecar(name) {
                continue;
            }

            let size_bytes = records
                .iter()
                .find(|r| r.file_name == name)
                .map(|r| r.size_bytes)
                .unwrap_or(0);

            entries.push(FileEntry {
                name: name.to_string(),
                path: path.to_string_lossy().into_owned(),
                size_bytes,
            });
        }

        entries
    }

    /// Hand a cached file to the platform viewer.
    pub async fn open(&self, local_path: &str, mime_type: &str) -> OpResult {
        match self.opener.open(Path::new(local_path), mime_type).await {
            Ok(()) => OpResult::ok(),
            Err(e) => {
                warn!(local_path, mime_type, error = %e, "Failed to open file");
                OpResult::err(e.to_string())
            }
        }
    }

    /// Delete a cached file and its metadata record.
    ///
    /// Idempotent: deleting an already-absent file still succeeds. The
    /// record is removed by the file's name regardless.
    pub async fn delete(&self, local_path: &str) -> OpResult {
        let path = Path::new(local_path);

        match self.fs.exists(path).await {
            Ok(true) => {
                if let Err(e) = self.fs.delete_file(path).await {
                    warn!(local_path, error = %e, "Failed to delete cached file");
                    return OpResult::err(e.to_string());
                }
                debug!(local_path, "Deleted cached file");
            }
            Ok(false) => debug!(local_path, "Delete of absent file, nothing to do"),
            Err(e) => {
                warn!(local_path, error = %e, "Existence check failed during delete");
                return OpResult::err(e.to_string());
            }
        }

        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if let Err(e) = self.metadata.remove_record(name).await {
                warn!(local_path, error = %e, "Failed to remove file record");
            }
        }

        OpResult::ok()
    }
}
