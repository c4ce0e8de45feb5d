//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the offline cache core and the
//! platform-specific implementations that surround it. Each trait represents
//! a capability the core requires but that must be supplied differently per
//! platform (desktop, iOS, Android, web).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`FileTransferClient`](transfer::FileTransferClient) - Streaming downloads with progress and cancellation
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Local file primitives (stat, move, delete, list)
//!
//! ### Remote Storage & Persistence
//! - [`ObjectStorage`](storage::ObjectStorage) - Signed and public URL issuance for remote objects
//! - [`KeyValueStore`](storage::KeyValueStore) - Durable string store for cache metadata
//!
//! ### Platform Integration
//! - [`FileOpener`](storage::FileOpener) - Hand a local file to the platform viewer
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type for
//! consistent error handling. Platform implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Provide actionable error messages
//! - Include error context (e.g., file paths, HTTP status)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks. Implementations must ensure thread safety.

pub mod error;
pub mod storage;
pub mod time;
pub mod transfer;

pub use error::BridgeError;

// Re-export commonly used types
pub use storage::{FileMetadata, FileOpener, FileSystemAccess, KeyValueStore, ObjectStorage};
pub use time::{Clock, SystemClock};
pub use transfer::{
    FileTransferClient, TransferObserver, TransferOutcome, TransferRequest,
};
