//! # Offline Content Cache
//!
//! Turns a remote, access-controlled document path into a verified, locally
//! cached file, bounding disk usage, surviving network failure, and avoiding
//! redundant re-downloads.
//!
//! ## Overview
//!
//! Key behaviors:
//! - Time-limited signed URL caching with retry/backoff and a configurable
//!   public-URL fallback
//! - Persisted, bounded file-metadata index over the host key-value store
//! - Size verification with delete-and-report of corrupt files
//! - Resumable transfer pipeline with exponential-backoff retry and
//!   at-most-one in-flight transfer per logical file
//! - Age- and size-based eviction keeping the cache under a hard cap
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     ContentCacheManager                │
//! │  - download() / progress()             │
//! │  - list() / open() / delete()          │
//! │  - initialize()                        │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> SignedUrlResolver (ObjectStorage)
//!          ├──> IntegrityChecker  (FileSystemAccess)
//!          ├──> CacheSweeper      (FileSystemAccess)
//!          ├──> MetadataStore     (KeyValueStore)
//!          └──> FileTransferClient (streaming download)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_cache::{CacheConfig, ContentCacheManager};
//!
//! # async fn example(manager: &ContentCacheManager) {
//! manager.initialize().await.expect("cache init");
//!
//! let outcome = manager.download("units/chapter1.pdf", "Chapter 1").await;
//! if outcome.success {
//!     println!("available at {:?}", outcome.local_path);
//!     if outcome.after_failure {
//!         println!("note: served a stale cached copy");
//!     }
//! }
//! # }
//! ```

pub mod config;
pub mod error;
pub mod files;
pub mod integrity;
pub mod manager;
pub mod metadata;
pub mod signed_url;
pub mod sweep;
pub mod types;

// Re-export commonly used types
pub use config::{CacheConfig, UrlFallbackPolicy};
pub use error::{CacheError, ErrorKind, Result};
pub use integrity::IntegrityChecker;
pub use manager::ContentCacheManager;
pub use metadata::MetadataStore;
pub use signed_url::{public_object_url, SignedUrlResolver};
pub use sweep::CacheSweeper;
pub use types::{
    cache_file_name, is_sidecar, sidecar_name, CachedFileRecord, DownloadOutcome,
    DownloadProgress, FileEntry, OpResult, SignedUrlEntry, SIDECAR_SUFFIX,
};
