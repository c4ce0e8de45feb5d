//! # Content Cache Manager
//!
//! Main orchestrator for downloading, verifying, and serving offline cached
//! content files.
//!
//! A `download()` call walks check-cache → resolve-url → transfer → verify →
//! publish, retrying with exponential backoff on transient failures and
//! falling back to the best available cached copy once the retry budget is
//! exhausted. At most one transfer is in flight per logical file; concurrent
//! requests for the same file attach to the existing operation's result.

use crate::config::CacheConfig;
use crate::error::{CacheError, ErrorKind, Result};
use crate::integrity::IntegrityChecker;
use crate::metadata::MetadataStore;
use crate::signed_url::SignedUrlResolver;
use crate::sweep::CacheSweeper;
use crate::types::{cache_file_name, sidecar_name, CachedFileRecord, DownloadOutcome, DownloadProgress};
use bridge_traits::{
    BridgeError, Clock, FileOpener, FileSystemAccess, FileTransferClient, KeyValueStore,
    ObjectStorage, SystemClock, TransferObserver, TransferOutcome, TransferRequest,
};
use std::cmp;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Offline content cache manager.
pub struct ContentCacheManager {
    pub(crate) config: CacheConfig,
    pub(crate) fs: Arc<dyn FileSystemAccess>,
    pub(crate) opener: Arc<dyn FileOpener>,
    pub(crate) metadata: MetadataStore,
    transfer: Arc<dyn FileTransferClient>,
    resolver: SignedUrlResolver,
    integrity: IntegrityChecker,
    sweeper: CacheSweeper,
    clock: Arc<dyn Clock>,
    in_flight: Mutex<HashMap<String, broadcast::Sender<DownloadOutcome>>>,
    progress: Arc<StdMutex<HashMap<String, DownloadProgress>>>,
}

impl ContentCacheManager {
    /// Create a new manager wired to the host's bridge implementations.
    ///
    /// # Arguments
    ///
    /// * `config` - Cache configuration
    /// * `fs` - Local file primitives
    /// * `transfer` - Streaming download client
    /// * `storage` - Remote object store issuing signed/public URLs
    /// * `kv` - Durable key-value store for cache metadata
    /// * `opener` - Platform file-opening collaborator
    pub fn new(
        config: CacheConfig,
        fs: Arc<dyn FileSystemAccess>,
        transfer: Arc<dyn FileTransferClient>,
        storage: Arc<dyn ObjectStorage>,
        kv: Arc<dyn KeyValueStore>,
        opener: Arc<dyn FileOpener>,
    ) -> Self {
        Self::with_clock(config, fs, transfer, storage, kv, opener, Arc::new(SystemClock))
    }

    /// Create a manager with an injected clock (used by tests to drive TTL
    /// and expiry logic deterministically).
    pub fn with_clock(
        config: CacheConfig,
        fs: Arc<dyn FileSystemAccess>,
        transfer: Arc<dyn FileTransferClient>,
        storage: Arc<dyn ObjectStorage>,
        kv: Arc<dyn KeyValueStore>,
        opener: Arc<dyn FileOpener>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let metadata = MetadataStore::new(kv, config.max_records);
        let resolver =
            SignedUrlResolver::new(&config, storage, metadata.clone(), Arc::clone(&clock));
        let integrity = IntegrityChecker::new(Arc::clone(&fs));
        let sweeper = CacheSweeper::new(&config, Arc::clone(&fs), metadata.clone(), Arc::clone(&clock));

        Self {
            config,
            fs,
            opener,
            metadata,
            transfer,
            resolver,
            integrity,
            sweeper,
            clock,
            in_flight: Mutex::new(HashMap::new()),
            progress: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Startup hook: validate configuration, make sure the cache directory
    /// exists, run one eviction pass, and drop expired signed-URL entries.
    ///
    /// Idempotent; safe to call before every batch of operations.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        self.config.validate().map_err(CacheError::Unknown)?;

        self.sweeper.ensure_ready().await?;

        let pruned = self
            .metadata
            .prune_expired_signed_urls(self.clock.now_ms())
            .await?;

        info!(
            dir = %self.config.cache_dir.display(),
            pruned_signed_urls = pruned,
            "Content cache ready"
        );
        Ok(())
    }

    /// Download a remote object into the cache and return its local path.
    ///
    /// Never returns an error across the subsystem boundary: the outcome is
    /// a plain result object whose `success`, `from_cache` and
    /// `after_failure` flags tell the caller what actually happened.
    ///
    /// A valid existing copy short-circuits without any network call. A
    /// concurrent request for the same logical file attaches to the existing
    /// operation instead of starting a second stream to the same temp path.
    #[instrument(skip(self))]
    pub async fn download(&self, remote_path: &str, display_name: &str) -> DownloadOutcome {
        let file_name = cache_file_name(remote_path);
        let final_path = self.config.cache_dir.join(&file_name);

        // Pre-flight: is there already a usable copy? (no expected size)
        if self.integrity.verify(&final_path, None).await {
            info!(file_name, display_name, "Serving existing cached copy");
            return DownloadOutcome::cached(&file_name, &final_path.to_string_lossy(), false);
        }

        // In-flight dedup: attach to an existing operation when present.
        let sender = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(existing) = in_flight.get(&file_name) {
                let mut rx = existing.subscribe();
                drop(in_flight);

                debug!(file_name, "Attaching to in-flight download");
                return match rx.recv().await {
                    Ok(outcome) => outcome,
                    Err(_) => DownloadOutcome::failed(&file_name, ErrorKind::Unknown, 0),
                };
            }

            let (tx, _rx) = broadcast::channel(1);
            in_flight.insert(file_name.clone(), tx.clone());
            tx
        };

        let outcome = self
            .run_download(&file_name, remote_path, display_name, &final_path)
            .await;

        self.in_flight.lock().await.remove(&file_name);
        self.progress
            .lock()
            .expect("progress map poisoned")
            .remove(&file_name);
        let _ = sender.send(outcome.clone());

        outcome
    }

    /// Current progress tick for an in-flight download, if any.
    pub fn progress(&self, file_name: &str) -> Option<DownloadProgress> {
        self.progress
            .lock()
            .expect("progress map poisoned")
            .get(file_name)
            .cloned()
    }

    /// Progress ticks for every in-flight download.
    pub fn active_downloads(&self) -> Vec<DownloadProgress> {
        self.progress
            .lock()
            .expect("progress map poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Retry loop around a single logical download.
    ///
    /// Restarts at URL resolution on every retry; the temp sidecar is
    /// cleaned up unconditionally between attempts.
    async fn run_download(
        &self,
        file_name: &str,
        remote_path: &str,
        display_name: &str,
        final_path: &Path,
    ) -> DownloadOutcome {
        let temp_path = self.config.cache_dir.join(sidecar_name(file_name));
        let mut attempt: u32 = 0;

        let last_error = loop {
            match self
                .attempt_transfer(file_name, remote_path, final_path, &temp_path)
                .await
            {
                Ok(record) => {
                    info!(
                        file_name,
                        display_name,
                        size = record.size_bytes,
                        retries = attempt,
                        "Download published"
                    );
                    return DownloadOutcome::fresh(&record, attempt);
                }
                Err(e) => {
                    self.cleanup_temp(&temp_path).await;

                    if !e.should_retry() || attempt >= self.config.max_retries {
                        break e;
                    }

                    let delay = cmp::min(
                        self.config.retry_base_delay * 2u32.saturating_pow(attempt),
                        self.config.retry_max_delay,
                    );
                    warn!(
                        file_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        };

        // Retry budget exhausted: stale-but-present beats nothing.
        if self.integrity.verify(final_path, None).await {
            warn!(
                file_name,
                error = %last_error,
                "Download failed, substituting existing cached copy"
            );
            return DownloadOutcome::cached(file_name, &final_path.to_string_lossy(), true);
        }

        error!(
            file_name,
            retry_count = attempt,
            kind = ?last_error.kind(),
            "Download failed with no usable cached copy"
        );
        DownloadOutcome::failed(file_name, last_error.kind(), attempt)
    }

    /// One resolve → transfer → verify → publish pass.
    async fn attempt_transfer(
        &self,
        file_name: &str,
        remote_path: &str,
        final_path: &Path,
        temp_path: &Path,
    ) -> Result<CachedFileRecord> {
        let url = self.resolver.resolve(&self.config.bucket, remote_path).await?;

        self.begin_progress(file_name);
        let outcome = self.execute_transfer(&url, temp_path, file_name).await?;

        match outcome.status {
            status if (200..300).contains(&status) => {}
            404 => return Err(CacheError::NotFound(remote_path.to_string())),
            507 => return Err(CacheError::StorageFull),
            status => {
                return Err(CacheError::Network(format!(
                    "transfer terminated with status {status}"
                )))
            }
        }

        if outcome.bytes_written == 0 {
            return Err(CacheError::Integrity(format!(
                "zero-byte transfer for {file_name}"
            )));
        }

        if !self
            .integrity
            .verify(temp_path, Some(outcome.bytes_written))
            .await
        {
            return Err(CacheError::Integrity(format!(
                "downloaded size mismatch for {file_name}"
            )));
        }

        // Publish: atomic rename, then record refresh (100-record cap applies).
        self.fs.move_file(temp_path, final_path).await?;

        let now_ms = self.clock.now_ms();
        let record = CachedFileRecord {
            file_name: file_name.to_string(),
            local_path: final_path.to_string_lossy().into_owned(),
            size_bytes: outcome.bytes_written,
            last_modified_at_ms: now_ms,
            downloaded_at_ms: now_ms,
        };
        self.metadata.upsert_record(record.clone()).await?;

        Ok(record)
    }

    /// Run the streaming transfer under the whole-transfer timeout.
    ///
    /// On timeout the in-flight primitive is explicitly cancelled and
    /// awaited, so no file handle survives into the next attempt.
    async fn execute_transfer(
        &self,
        url: &str,
        temp_path: &Path,
        file_name: &str,
    ) -> Result<TransferOutcome> {
        let cancel = CancellationToken::new();
        let observer: Arc<dyn TransferObserver> = Arc::new(ProgressRecorder {
            file_name: file_name.to_string(),
            progress: Arc::clone(&self.progress),
            clock: Arc::clone(&self.clock),
        });

        let transfer = self.transfer.download_to_file(
            TransferRequest::new(url),
            temp_path,
            Some(observer),
            cancel.clone(),
        );
        tokio::pin!(transfer);

        tokio::select! {
            result = &mut transfer => result.map_err(|e| match e {
                BridgeError::Cancelled(msg) => CacheError::Network(format!("transfer cancelled: {msg}")),
                other => CacheError::Network(other.to_string()),
            }),
            _ = tokio::time::sleep(self.config.transfer_timeout) => {
                warn!(file_name, timeout = ?self.config.transfer_timeout, "Transfer timed out, cancelling");
                cancel.cancel();
                let _ = transfer.await;
                Err(CacheError::Network(format!(
                    "transfer timed out after {:?}",
                    self.config.transfer_timeout
                )))
            }
        }
    }

    fn begin_progress(&self, file_name: &str) {
        let tick = DownloadProgress {
            file_name: file_name.to_string(),
            bytes_written: 0,
            bytes_expected: None,
            updated_at_ms: self.clock.now_ms(),
        };
        self.progress
            .lock()
            .expect("progress map poisoned")
            .insert(file_name.to_string(), tick);
    }

    /// Best-effort sidecar removal; absence is not an error.
    async fn cleanup_temp(&self, temp_path: &Path) {
        match self.fs.exists(temp_path).await {
            Ok(true) => {
                if let Err(e) = self.fs.delete_file(temp_path).await {
                    warn!(path = %temp_path.display(), error = %e, "Failed to clean up temp file");
                }
            }
            Ok(false) => {}
            Err(e) => {
                warn!(path = %temp_path.display(), error = %e, "Temp cleanup existence check failed");
            }
        }
    }
}

/// Observer bridging transfer progress into the ephemeral progress map.
///
/// Each tick overwrites the previous one in place; nothing is persisted.
struct ProgressRecorder {
    file_name: String,
    progress: Arc<StdMutex<HashMap<String, DownloadProgress>>>,
    clock: Arc<dyn Clock>,
}

impl TransferObserver for ProgressRecorder {
    fn on_progress(&self, bytes_written: u64, bytes_expected: Option<u64>) {
        let tick = DownloadProgress {
            file_name: self.file_name.clone(),
            bytes_written,
            bytes_expected,
            updated_at_ms: self.clock.now_ms(),
        };

        self.progress
            .lock()
            .expect("progress map poisoned")
            .insert(self.file_name.clone(), tick);
    }
}
