//! Shared in-memory bridge implementations for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    BridgeError, Clock, FileMetadata, FileOpener, FileSystemAccess, FileTransferClient,
    KeyValueStore, ObjectStorage, TransferObserver, TransferOutcome, TransferRequest,
};
use chrono::{DateTime, Utc};
use core_cache::{public_object_url, CacheConfig, ContentCacheManager};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Baseline "now" for the manual clock: 2023-11-14T22:13:20Z.
pub const START_MS: i64 = 1_700_000_000_000;

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Manually driven wall clock, independent of tokio's virtual time.
pub struct ManualClock {
    ms: Mutex<i64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            ms: Mutex::new(start_ms),
        }
    }

    pub fn advance(&self, delta_ms: i64) {
        *self.ms.lock().unwrap() += delta_ms;
    }

    pub fn set(&self, ms: i64) {
        *self.ms.lock().unwrap() = ms;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(*self.ms.lock().unwrap()).expect("valid test timestamp")
    }
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct MemFile {
    size: u64,
    modified_at_ms: i64,
}

/// In-memory filesystem with per-path failure injection.
#[derive(Default)]
pub struct MemoryFs {
    files: Mutex<HashMap<PathBuf, MemFile>>,
    dirs: Mutex<HashSet<PathBuf>>,
    fail_delete: Mutex<HashSet<PathBuf>>,
    fail_exists: Mutex<HashSet<PathBuf>>,
}

impl MemoryFs {
    pub fn seed_file(&self, path: impl Into<PathBuf>, size: u64, modified_at_ms: i64) {
        self.files.lock().unwrap().insert(
            path.into(),
            MemFile {
                size,
                modified_at_ms,
            },
        );
    }

    pub fn seed_dir(&self, path: impl Into<PathBuf>) {
        self.dirs.lock().unwrap().insert(path.into());
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.files
            .lock()
            .unwrap()
            .contains_key(path.as_ref())
    }

    pub fn size_of(&self, path: impl AsRef<Path>) -> Option<u64> {
        self.files
            .lock()
            .unwrap()
            .get(path.as_ref())
            .map(|f| f.size)
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    /// Make `delete_file` fail for this path.
    pub fn refuse_delete(&self, path: impl Into<PathBuf>) {
        self.fail_delete.lock().unwrap().insert(path.into());
    }

    /// Make `exists` fail for this path.
    pub fn refuse_exists(&self, path: impl Into<PathBuf>) {
        self.fail_exists.lock().unwrap().insert(path.into());
    }

    /// Forget a directory so listing it fails.
    pub fn remove_dir(&self, path: impl AsRef<Path>) {
        self.dirs.lock().unwrap().remove(path.as_ref());
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFs {
    async fn exists(&self, path: &Path) -> bridge_traits::error::Result<bool> {
        if self.fail_exists.lock().unwrap().contains(path) {
            return Err(BridgeError::OperationFailed(format!(
                "stat: {}",
                path.display()
            )));
        }

        Ok(self.files.lock().unwrap().contains_key(path)
            || self.dirs.lock().unwrap().contains(path))
    }

    async fn metadata(&self, path: &Path) -> bridge_traits::error::Result<FileMetadata> {
        if self.dirs.lock().unwrap().contains(path) {
            return Ok(FileMetadata {
                size: 0,
                modified_at_ms: None,
                is_directory: true,
            });
        }

        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|f| FileMetadata {
                size: f.size,
                modified_at_ms: Some(f.modified_at_ms),
                is_directory: false,
            })
            .ok_or_else(|| BridgeError::OperationFailed(format!("stat: {}", path.display())))
    }

    async fn create_dir_all(&self, path: &Path) -> bridge_traits::error::Result<()> {
        self.dirs.lock().unwrap().insert(path.to_path_buf());
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> bridge_traits::error::Result<()> {
        if self.fail_delete.lock().unwrap().contains(path) {
            return Err(BridgeError::OperationFailed(format!(
                "permission denied: {}",
                path.display()
            )));
        }

        self.files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BridgeError::OperationFailed(format!("unlink: {}", path.display())))
    }

    async fn move_file(&self, from: &Path, to: &Path) -> bridge_traits::error::Result<()> {
        let mut files = self.files.lock().unwrap();
        let file = files
            .remove(from)
            .ok_or_else(|| BridgeError::OperationFailed(format!("rename: {}", from.display())))?;
        files.insert(to.to_path_buf(), file);
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> bridge_traits::error::Result<Vec<PathBuf>> {
        if !self.dirs.lock().unwrap().contains(path) {
            return Err(BridgeError::OperationFailed(format!(
                "readdir: {}",
                path.display()
            )));
        }

        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Key-value store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryKv {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn raw_get(&self, key: &str) -> Option<String> {
        self.data.lock().unwrap().get(key).cloned()
    }

    pub fn raw_set(&self, key: &str, value: &str) {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> bridge_traits::error::Result<Option<String>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> bridge_traits::error::Result<()> {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> bridge_traits::error::Result<()> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> bridge_traits::error::Result<Vec<String>> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Object storage (signing service)
// ---------------------------------------------------------------------------

/// Signing stub: fails the first `fail_first` calls, then succeeds.
///
/// Records the virtual instant of every call so tests can assert backoff
/// spacing under tokio's paused clock.
pub struct StubSigner {
    fail_first: AtomicU32,
    calls: Mutex<Vec<tokio::time::Instant>>,
}

impl StubSigner {
    pub fn new() -> Self {
        Self {
            fail_first: AtomicU32::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_first(&self, n: u32) {
        self.fail_first.store(n, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_instants(&self) -> Vec<tokio::time::Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStorage for StubSigner {
    async fn create_signed_url(
        &self,
        _bucket: &str,
        object_path: &str,
        _ttl_seconds: u32,
    ) -> bridge_traits::error::Result<String> {
        let call_index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(tokio::time::Instant::now());
            calls.len() as u32 - 1
        };

        if call_index < self.fail_first.load(Ordering::SeqCst) {
            Err(BridgeError::OperationFailed("signing unavailable".into()))
        } else {
            Ok(format!("https://cdn.test/signed/{object_path}"))
        }
    }

    fn public_url(&self, bucket: &str, object_path: &str) -> String {
        public_object_url("https://cdn.test", bucket, object_path)
    }
}

// ---------------------------------------------------------------------------
// Transfer client
// ---------------------------------------------------------------------------

/// Scripted behavior for one transfer call.
#[derive(Clone)]
pub enum TransferPlan {
    /// Write `actual` bytes to the destination, report `reported` written.
    Success { reported: u64, actual: u64 },
    /// Terminate with the given HTTP status, writing nothing.
    Status(u16),
    /// Fail with a connection/stream error.
    Fail(String),
    /// Fail, but first make a file appear at an unrelated path (simulates
    /// other work interleaving during the suspension).
    FailSeeding { path: PathBuf, size: u64 },
    /// Sleep on virtual time before succeeding.
    Delay { millis: u64, bytes: u64 },
    /// Write a partial file, then block until the cancellation token fires.
    HangUntilCancelled { partial_bytes: u64 },
}

/// Transfer stub driven by a plan queue; falls back to `always` when the
/// queue is empty.
pub struct StubTransfer {
    fs: Arc<MemoryFs>,
    clock: Arc<ManualClock>,
    plans: Mutex<VecDeque<TransferPlan>>,
    always: Mutex<Option<TransferPlan>>,
    calls: AtomicU32,
    cancelled_seen: AtomicBool,
}

impl StubTransfer {
    pub fn new(fs: Arc<MemoryFs>, clock: Arc<ManualClock>) -> Self {
        Self {
            fs,
            clock,
            plans: Mutex::new(VecDeque::new()),
            always: Mutex::new(None),
            calls: AtomicU32::new(0),
            cancelled_seen: AtomicBool::new(false),
        }
    }

    pub fn push(&self, plan: TransferPlan) {
        self.plans.lock().unwrap().push_back(plan);
    }

    pub fn set_always(&self, plan: TransferPlan) {
        *self.always.lock().unwrap() = Some(plan);
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn saw_cancellation(&self) -> bool {
        self.cancelled_seen.load(Ordering::SeqCst)
    }

    fn next_plan(&self) -> TransferPlan {
        if let Some(plan) = self.plans.lock().unwrap().pop_front() {
            return plan;
        }
        self.always
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(TransferPlan::Fail("no transfer plan scripted".into()))
    }

    fn complete(
        &self,
        dest: &Path,
        reported: u64,
        actual: u64,
        observer: Option<Arc<dyn TransferObserver>>,
    ) -> TransferOutcome {
        if let Some(observer) = observer {
            observer.on_progress(actual / 2, Some(reported));
            observer.on_progress(actual, Some(reported));
        }
        self.fs.seed_file(dest, actual, self.clock.now_ms());
        TransferOutcome {
            status: 200,
            bytes_written: reported,
        }
    }
}

#[async_trait]
impl FileTransferClient for StubTransfer {
    async fn download_to_file(
        &self,
        _request: TransferRequest,
        dest: &Path,
        observer: Option<Arc<dyn TransferObserver>>,
        cancel: CancellationToken,
    ) -> bridge_traits::error::Result<TransferOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match self.next_plan() {
            TransferPlan::Success { reported, actual } => {
                Ok(self.complete(dest, reported, actual, observer))
            }
            TransferPlan::Status(status) => Ok(TransferOutcome {
                status,
                bytes_written: 0,
            }),
            TransferPlan::Fail(message) => Err(BridgeError::OperationFailed(message)),
            TransferPlan::FailSeeding { path, size } => {
                self.fs.seed_file(path, size, self.clock.now_ms());
                Err(BridgeError::OperationFailed("stream reset".into()))
            }
            TransferPlan::Delay { millis, bytes } => {
                tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
                Ok(self.complete(dest, bytes, bytes, observer))
            }
            TransferPlan::HangUntilCancelled { partial_bytes } => {
                self.fs
                    .seed_file(dest, partial_bytes, self.clock.now_ms());
                cancel.cancelled().await;
                self.cancelled_seen.store(true, Ordering::SeqCst);
                Err(BridgeError::Cancelled("stream aborted".into()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// File opener
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingOpener {
    calls: Mutex<Vec<(PathBuf, String)>>,
    fail: AtomicBool,
}

impl RecordingOpener {
    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(PathBuf, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileOpener for RecordingOpener {
    async fn open(&self, path: &Path, mime_type: &str) -> bridge_traits::error::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), mime_type.to_string()));

        if self.fail.swap(false, Ordering::SeqCst) {
            Err(BridgeError::NotAvailable("no viewer registered".into()))
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub fs: Arc<MemoryFs>,
    pub kv: Arc<MemoryKv>,
    pub signer: Arc<StubSigner>,
    pub transfer: Arc<StubTransfer>,
    pub opener: Arc<RecordingOpener>,
    pub clock: Arc<ManualClock>,
    pub manager: Arc<ContentCacheManager>,
}

impl Harness {
    pub fn cache_path(&self, name: &str) -> PathBuf {
        self.manager_config_dir().join(name)
    }

    fn manager_config_dir(&self) -> PathBuf {
        PathBuf::from("/cache/content_cache")
    }
}

/// Build a manager over fresh in-memory bridges.
///
/// The cache directory is `/cache/content_cache` and already exists.
pub fn harness(config: CacheConfig) -> Harness {
    let config = config.with_cache_dir("/cache/content_cache");

    let clock = Arc::new(ManualClock::new(START_MS));
    let fs = Arc::new(MemoryFs::default());
    fs.seed_dir("/cache/content_cache");

    let kv = Arc::new(MemoryKv::default());
    let signer = Arc::new(StubSigner::new());
    let transfer = Arc::new(StubTransfer::new(Arc::clone(&fs), Arc::clone(&clock)));
    let opener = Arc::new(RecordingOpener::default());

    let manager = Arc::new(ContentCacheManager::with_clock(
        config,
        fs.clone(),
        transfer.clone(),
        signer.clone(),
        kv.clone(),
        opener.clone(),
        clock.clone(),
    ));

    Harness {
        fs,
        kv,
        signer,
        transfer,
        opener,
        clock,
        manager,
    }
}
