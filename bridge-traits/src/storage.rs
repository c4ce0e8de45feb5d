//! Storage Abstractions
//!
//! Platform-agnostic traits for local file primitives, key-value persistence,
//! and the remote object store that issues access URLs.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    /// Last modification time in epoch milliseconds, when the platform
    /// exposes one.
    pub modified_at_ms: Option<i64>,
    pub is_directory: bool,
}

/// File system access trait
///
/// Abstracts the local file primitives the cache driver calls but does not
/// implement:
/// - Desktop: direct filesystem access
/// - iOS/Android: sandboxed app directories
/// - Web: OPFS
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn prepare(fs: &dyn FileSystemAccess) -> Result<()> {
///     let root = std::path::Path::new("/cache/content_cache");
///     if !fs.exists(root).await? {
///         fs.create_dir_all(root).await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Delete a file
    ///
    /// Deleting a path that does not exist is an error; callers that need
    /// idempotent deletion check `exists` first or swallow the failure.
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Atomically move a file into its final location
    ///
    /// Used to publish a fully written temp file; implementations must not
    /// expose a half-moved state to concurrent readers.
    async fn move_file(&self, from: &Path, to: &Path) -> Result<()>;

    /// List all entries in a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Key-value persistence trait
///
/// Abstracts the host's durable string store:
/// - iOS: UserDefaults
/// - Android: SharedPreferences / DataStore
/// - Desktop: config files
/// - Web: localStorage
///
/// Missing keys are never errors; `get` returns `None` and `remove` of an
/// absent key succeeds silently.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Retrieve a value, or `None` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, overwriting any previous one
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a key (no-op when absent)
    async fn remove(&self, key: &str) -> Result<()>;

    /// List all keys starting with the given prefix
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Remote object storage trait
///
/// The access-controlled store that holds the actual content objects. It
/// issues time-limited signed URLs for private objects and deterministic
/// public URLs that require no network round trip.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Ask the service to sign a time-limited URL for a private object
    ///
    /// # Errors
    ///
    /// Returns an error when the signing call fails to connect, times out,
    /// or the service rejects the request.
    async fn create_signed_url(
        &self,
        bucket: &str,
        object_path: &str,
        ttl_seconds: u32,
    ) -> Result<String>;

    /// Build the deterministic public URL for an object
    ///
    /// Purely computational; the returned URL may still be unauthorized or
    /// 404 at fetch time if the bucket is private.
    fn public_url(&self, bucket: &str, object_path: &str) -> String;
}

/// Platform file-opening trait
///
/// Hands a downloaded file to the platform viewer (PDF reader, image
/// viewer, ...). Implementations surface failures as errors; they must not
/// panic on unknown mime types.
#[async_trait]
pub trait FileOpener: Send + Sync {
    async fn open(&self, path: &Path, mime_type: &str) -> Result<()>;
}
