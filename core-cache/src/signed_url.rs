//! Signed URL Resolver
//!
//! Turns a remote object path into a fetchable, time-limited URL. Resolution
//! prefers the in-process map, then the persisted metadata cache, then a
//! remote signing call with retry/backoff. When every attempt is exhausted
//! the configured fallback policy decides between a deterministic public-URL
//! guess and failing fast.
//!
//! The in-process map is an owned field of the resolver instance, never a
//! module-level singleton, so tests can instantiate isolated resolvers.

use crate::config::{CacheConfig, UrlFallbackPolicy};
use crate::error::{CacheError, Result};
use crate::metadata::MetadataStore;
use crate::types::SignedUrlEntry;
use bridge_traits::{Clock, ObjectStorage};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Resolver for time-limited object access URLs.
pub struct SignedUrlResolver {
    storage: Arc<dyn ObjectStorage>,
    metadata: MetadataStore,
    clock: Arc<dyn Clock>,
    memory: Mutex<HashMap<String, SignedUrlEntry>>,
    signing_retries: u32,
    signing_backoff_base: Duration,
    signed_url_ttl: Duration,
    effective_ttl: Duration,
    fallback: UrlFallbackPolicy,
}

impl SignedUrlResolver {
    pub fn new(
        config: &CacheConfig,
        storage: Arc<dyn ObjectStorage>,
        metadata: MetadataStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            metadata,
            clock,
            memory: Mutex::new(HashMap::new()),
            signing_retries: config.signing_retries,
            signing_backoff_base: config.signing_backoff_base,
            signed_url_ttl: config.signed_url_ttl,
            effective_ttl: config.effective_signed_url_ttl(),
            fallback: config.url_fallback,
        }
    }

    /// Resolve a fetchable URL for `object_path`.
    ///
    /// Under [`UrlFallbackPolicy::PublicUrl`] this never returns an error:
    /// exhausted signing falls back to the deterministic public URL, which
    /// may still be unauthorized at fetch time; the caller treats that as a
    /// normal transfer failure. Under [`UrlFallbackPolicy::FailFast`]
    /// exhaustion surfaces as [`CacheError::Network`].
    pub async fn resolve(&self, bucket: &str, object_path: &str) -> Result<String> {
        let now_ms = self.clock.now_ms();

        // Layer 1: in-process map
        if let Some(url) = self.memory_lookup(object_path, now_ms) {
            debug!(object_path, "Signed URL served from memory");
            return Ok(url);
        }

        // Layer 2: persisted cache; errors here degrade to a miss
        match self.metadata.signed_url_entry(object_path).await {
            Ok(Some(entry)) if entry.is_valid_at(now_ms) => {
                debug!(object_path, "Signed URL served from persisted cache");
                self.memory_insert(object_path, entry.clone());
                return Ok(entry.url);
            }
            Ok(Some(_)) => {
                // Expired: discard, then fall through to a fresh signing call
                if let Err(e) = self.metadata.remove_signed_url_entry(object_path).await {
                    warn!(object_path, error = %e, "Failed to discard expired signed URL entry");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(object_path, error = %e, "Persisted signed URL lookup failed, treating as miss");
            }
        }

        // Layer 3: remote signing with retry/backoff
        match self.sign_with_retry(bucket, object_path).await {
            Ok(url) => {
                let entry = SignedUrlEntry {
                    url: url.clone(),
                    expires_at_ms: self.clock.now_ms() + self.effective_ttl.as_millis() as i64,
                };

                self.memory_insert(object_path, entry.clone());
                if let Err(e) = self.metadata.put_signed_url_entry(object_path, &entry).await {
                    warn!(object_path, error = %e, "Failed to persist signed URL entry");
                }

                Ok(url)
            }
            Err(e) => match self.fallback {
                UrlFallbackPolicy::PublicUrl => {
                    warn!(
                        object_path,
                        error = %e,
                        "Signing exhausted, falling back to public URL"
                    );
                    Ok(self.storage.public_url(bucket, object_path))
                }
                UrlFallbackPolicy::FailFast => Err(e),
            },
        }
    }

    /// Drop any cached URL for `object_path` from both layers.
    pub async fn invalidate(&self, object_path: &str) {
        self.memory.lock().expect("signed URL map poisoned").remove(object_path);
        if let Err(e) = self.metadata.remove_signed_url_entry(object_path).await {
            warn!(object_path, error = %e, "Failed to invalidate persisted signed URL entry");
        }
    }

    async fn sign_with_retry(&self, bucket: &str, object_path: &str) -> Result<String> {
        let ttl_seconds = self.signed_url_ttl.as_secs() as u32;
        let mut last_error = None;

        for attempt in 0..=self.signing_retries {
            match self
                .storage
                .create_signed_url(bucket, object_path, ttl_seconds)
                .await
            {
                Ok(url) => {
                    debug!(object_path, attempt, "Signing call succeeded");
                    return Ok(url);
                }
                Err(e) => {
                    warn!(object_path, attempt, error = %e, "Signing call failed");
                    last_error = Some(e);
                }
            }

            if attempt < self.signing_retries {
                let delay = self.signing_backoff_base * 2u32.saturating_pow(attempt);
                tokio::time::sleep(delay).await;
            }
        }

        Err(CacheError::Network(format!(
            "signing exhausted after {} attempts: {}",
            self.signing_retries + 1,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        )))
    }

    fn memory_lookup(&self, object_path: &str, now_ms: i64) -> Option<String> {
        let mut map = self.memory.lock().expect("signed URL map poisoned");
        match map.get(object_path) {
            Some(entry) if entry.is_valid_at(now_ms) => Some(entry.url.clone()),
            Some(_) => {
                map.remove(object_path);
                None
            }
            None => None,
        }
    }

    fn memory_insert(&self, object_path: &str, entry: SignedUrlEntry) {
        self.memory
            .lock()
            .expect("signed URL map poisoned")
            .insert(object_path.to_string(), entry);
    }
}

/// Build the conventional public URL for an object.
///
/// Layout: `{service_base}/object/public/{bucket}/{encoded_object_path}`,
/// with each path segment percent-encoded and separators preserved.
/// `ObjectStorage::public_url` implementations typically delegate here.
pub fn public_object_url(service_base: &str, bucket: &str, object_path: &str) -> String {
    let encoded: Vec<String> = object_path
        .trim_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();

    format!(
        "{}/object/public/{}/{}",
        service_base.trim_end_matches('/'),
        bucket,
        encoded.join("/")
    )
}
