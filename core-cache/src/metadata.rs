//! Metadata Store
//!
//! Thin persistence wrapper over the host's key-value store. Owns both halves
//! of the persisted cache state: the bounded, recency-sorted list of
//! downloaded-file records and the map of signed-URL entries.
//!
//! Corrupted JSON under any single key is treated as "entry absent", never as
//! a fatal read error; the next write replaces it.

use crate::error::Result;
use crate::types::{CachedFileRecord, SignedUrlEntry};
use bridge_traits::KeyValueStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Key holding the JSON array of file records.
const RECORDS_KEY: &str = "cache.files";

/// Prefix namespacing persisted signed-URL entries, one key per object path.
const SIGNED_URL_PREFIX: &str = "cache.signed_url.";

/// Persistence wrapper for cache metadata.
///
/// Single-key operations are atomic from the caller's point of view; the
/// record list is one key, so prune-then-write happens in a single `set`.
#[derive(Clone)]
pub struct MetadataStore {
    store: Arc<dyn KeyValueStore>,
    max_records: usize,
}

impl MetadataStore {
    pub fn new(store: Arc<dyn KeyValueStore>, max_records: usize) -> Self {
        Self { store, max_records }
    }

    /// List all file records, most recently downloaded first.
    pub async fn list_records(&self) -> Result<Vec<CachedFileRecord>> {
        let Some(raw) = self.store.get(RECORDS_KEY).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<CachedFileRecord>>(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(error = %e, "Corrupted file record list, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Look up a single record by its logical file name.
    pub async fn find_record(&self, file_name: &str) -> Result<Option<CachedFileRecord>> {
        let records = self.list_records().await?;
        Ok(records.into_iter().find(|r| r.file_name == file_name))
    }

    /// Insert or refresh a record, keeping the list recency-sorted and capped.
    ///
    /// Any previous record with the same `file_name` is replaced; when the
    /// cap is exceeded the oldest records are dropped first.
    pub async fn upsert_record(&self, record: CachedFileRecord) -> Result<()> {
        let mut records = self.list_records().await?;
        records.retain(|r| r.file_name != record.file_name);
        records.insert(0, record);
        records.truncate(self.max_records);

        self.persist_records(&records).await
    }

    /// Remove a record by file name (no-op when absent).
    pub async fn remove_record(&self, file_name: &str) -> Result<()> {
        let mut records = self.list_records().await?;
        let before = records.len();
        records.retain(|r| r.file_name != file_name);

        if records.len() != before {
            self.persist_records(&records).await?;
            debug!(file_name, "Removed file record");
        }

        Ok(())
    }

    async fn persist_records(&self, records: &[CachedFileRecord]) -> Result<()> {
        let json = serde_json::to_string(records)
            .map_err(|e| crate::error::CacheError::Unknown(format!("record serialization: {e}")))?;
        self.store.set(RECORDS_KEY, &json).await?;
        Ok(())
    }

    /// Retrieve the persisted signed-URL entry for an object path.
    pub async fn signed_url_entry(&self, object_path: &str) -> Result<Option<SignedUrlEntry>> {
        let key = signed_url_key(object_path);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<SignedUrlEntry>(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(object_path, error = %e, "Corrupted signed URL entry, treating as absent");
                Ok(None)
            }
        }
    }

    /// Persist a signed-URL entry for an object path.
    pub async fn put_signed_url_entry(
        &self,
        object_path: &str,
        entry: &SignedUrlEntry,
    ) -> Result<()> {
        let key = signed_url_key(object_path);
        let json = serde_json::to_string(entry)
            .map_err(|e| crate::error::CacheError::Unknown(format!("entry serialization: {e}")))?;
        self.store.set(&key, &json).await?;
        Ok(())
    }

    /// Drop the persisted signed-URL entry for an object path (no-op when absent).
    pub async fn remove_signed_url_entry(&self, object_path: &str) -> Result<()> {
        self.store.remove(&signed_url_key(object_path)).await?;
        Ok(())
    }

    /// Delete every persisted signed-URL entry that has expired by `now_ms`.
    ///
    /// Corrupted entries are removed as well; they can never become valid.
    pub async fn prune_expired_signed_urls(&self, now_ms: i64) -> Result<usize> {
        let keys = self.store.keys_with_prefix(SIGNED_URL_PREFIX).await?;
        let mut pruned = 0;

        for key in keys {
            let keep = match self.store.get(&key).await? {
                Some(raw) => serde_json::from_str::<SignedUrlEntry>(&raw)
                    .map(|entry| entry.is_valid_at(now_ms))
                    .unwrap_or(false),
                None => true,
            };

            if !keep {
                self.store.remove(&key).await?;
                pruned += 1;
            }
        }

        if pruned > 0 {
            debug!(pruned, "Pruned expired signed URL entries");
        }

        Ok(pruned)
    }
}

fn signed_url_key(object_path: &str) -> String {
    format!("{}{}", SIGNED_URL_PREFIX, object_path)
}
