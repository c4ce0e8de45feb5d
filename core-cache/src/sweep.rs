//! Cache Directory Manager
//!
//! Keeps the cache directory existing and bounded. Each pass first purges
//! entries older than the TTL unconditionally, then, if total size still
//! exceeds the hard cap, evicts least-recently-modified files until usage
//! falls under the soft target, stopping early to avoid thrashing at the
//! boundary.
//!
//! In-progress `.download` sidecars are never eviction candidates, so a
//! sweep can run concurrently with a transfer landing a new file.

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::metadata::MetadataStore;
use crate::types::is_sidecar;
use bridge_traits::{Clock, FileSystemAccess};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

struct SweepEntry {
    path: PathBuf,
    file_name: String,
    size: u64,
    modified_at_ms: i64,
}

/// Ensures the cache directory exists and enforces the eviction policy.
pub struct CacheSweeper {
    fs: Arc<dyn FileSystemAccess>,
    metadata: MetadataStore,
    clock: Arc<dyn Clock>,
    cache_dir: PathBuf,
    entry_ttl: Duration,
    max_bytes: u64,
    target_bytes: u64,
}

impl CacheSweeper {
    pub fn new(
        config: &CacheConfig,
        fs: Arc<dyn FileSystemAccess>,
        metadata: MetadataStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            fs,
            metadata,
            clock,
            cache_dir: config.cache_dir.clone(),
            entry_ttl: config.entry_ttl,
            max_bytes: config.max_cache_size_bytes,
            target_bytes: config.size_evict_target_bytes(),
        }
    }

    /// Create the cache directory if absent, then run one eviction pass.
    ///
    /// Idempotent and safe to call before every operation. A single entry's
    /// stat or delete error is caught and skipped; one bad entry never
    /// aborts the sweep.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::StorageFull`] when the pass could not bring
    /// usage under the hard cap (for example, an undeletable file larger
    /// than the cap).
    #[instrument(skip(self))]
    pub async fn ensure_ready(&self) -> Result<()> {
        if !self.fs.exists(&self.cache_dir).await? {
            debug!(dir = %self.cache_dir.display(), "Creating cache directory");
            self.fs.create_dir_all(&self.cache_dir).await?;
            return Ok(());
        }

        let mut entries = self.collect_entries().await?;
        let now_ms = self.clock.now_ms();
        let ttl_ms = self.entry_ttl.as_millis() as i64;

        // Age eviction: unconditional, independent of size.
        let mut survivors = Vec::with_capacity(entries.len());
        for entry in entries.drain(..) {
            if now_ms - entry.modified_at_ms > ttl_ms {
                info!(
                    file = %entry.file_name,
                    age_ms = now_ms - entry.modified_at_ms,
                    "Evicting entry past TTL"
                );
                self.evict(&entry).await;
            } else {
                survivors.push(entry);
            }
        }

        let mut total: u64 = survivors.iter().map(|e| e.size).sum();
        if total <= self.max_bytes {
            return Ok(());
        }

        // Size eviction: least-recently-modified first, stop once under the
        // soft target.
        info!(
            total,
            cap = self.max_bytes,
            target = self.target_bytes,
            "Cache over size cap, evicting by modification time"
        );
        survivors.sort_by_key(|e| e.modified_at_ms);

        for entry in &survivors {
            if total <= self.target_bytes {
                break;
            }
            if self.evict(entry).await {
                total -= entry.size;
            }
        }

        if total > self.max_bytes {
            warn!(total, cap = self.max_bytes, "Eviction could not get under the cap");
            return Err(CacheError::StorageFull);
        }

        Ok(())
    }

    async fn collect_entries(&self) -> Result<Vec<SweepEntry>> {
        let paths = self.fs.list_directory(&self.cache_dir).await?;
        let mut entries = Vec::with_capacity(paths.len());

        for path in paths {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if is_sidecar(file_name) {
                continue;
            }

            let meta = match self.fs.metadata(&path).await {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Stat failed, skipping entry");
                    continue;
                }
            };

            if meta.is_directory {
                continue;
            }

            entries.push(SweepEntry {
                file_name: file_name.to_string(),
                size: meta.size,
                // No mtime means we cannot prove staleness; treat as fresh.
                modified_at_ms: meta.modified_at_ms.unwrap_or_else(|| self.clock.now_ms()),
                path,
            });
        }

        Ok(entries)
    }

    /// Delete one file and its metadata record as a single logical step.
    ///
    /// Returns whether the file itself was removed. A record-removal failure
    /// after a successful file delete leaves dangling metadata that fails
    /// integrity checks and self-heals on a later pass.
    async fn evict(&self, entry: &SweepEntry) -> bool {
        if let Err(e) = self.fs.delete_file(&entry.path).await {
            warn!(path = %entry.path.display(), error = %e, "Failed to delete file, skipping");
            return false;
        }

        if let Err(e) = self.metadata.remove_record(&entry.file_name).await {
            warn!(
                file = %entry.file_name,
                error = %e,
                "File deleted but record removal failed; will self-heal"
            );
        }

        true
    }
}
