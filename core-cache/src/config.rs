//! Cache configuration and policies

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the offline content cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding published files and in-progress sidecars
    pub cache_dir: PathBuf,

    /// Bucket the remote objects live in
    pub bucket: String,

    /// Hard cap on total cache size in bytes (default: 500 MB)
    pub max_cache_size_bytes: u64,

    /// Size eviction stops once usage falls under this fraction of the cap
    /// (default: 0.90), to avoid thrashing at the boundary
    pub size_evict_target_ratio: f64,

    /// Age after which an entry is evicted unconditionally (default: 90 days)
    pub entry_ttl: Duration,

    /// Extra transfer attempts after the first failure (default: 3, i.e. 4 total)
    pub max_retries: u32,

    /// Base delay for transfer retry backoff (default: 1s)
    pub retry_base_delay: Duration,

    /// Ceiling for transfer retry backoff (default: 30s)
    pub retry_max_delay: Duration,

    /// Extra signing attempts after the first failure (default: 2, i.e. 3 total)
    pub signing_retries: u32,

    /// Base delay for signing retry backoff (default: 1s, factor 2)
    pub signing_backoff_base: Duration,

    /// TTL requested from the signing service (default: 60 min)
    pub signed_url_ttl: Duration,

    /// Safety margin subtracted from the service TTL when caching the URL
    /// (default: 5 min)
    pub signed_url_expiry_margin: Duration,

    /// Whole-transfer timeout (default: 60s)
    pub transfer_timeout: Duration,

    /// Cap on persisted file records, oldest dropped first (default: 100)
    pub max_records: usize,

    /// What to do when signing retries are exhausted
    pub url_fallback: UrlFallbackPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("content_cache"),
            bucket: "content".to_string(),
            max_cache_size_bytes: 500 * 1024 * 1024,
            size_evict_target_ratio: 0.90,
            entry_ttl: Duration::from_secs(90 * 24 * 60 * 60),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
            signing_retries: 2,
            signing_backoff_base: Duration::from_secs(1),
            signed_url_ttl: Duration::from_secs(60 * 60),
            signed_url_expiry_margin: Duration::from_secs(5 * 60),
            transfer_timeout: Duration::from_secs(60),
            max_records: 100,
            url_fallback: UrlFallbackPolicy::PublicUrl,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Set the remote bucket name.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Set maximum cache size.
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_cache_size_bytes = bytes;
        self
    }

    /// Set the unconditional age-eviction threshold.
    pub fn with_entry_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    /// Set extra transfer attempts after the first failure.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the whole-transfer timeout.
    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    /// Set the exhausted-signing fallback policy.
    pub fn with_url_fallback(mut self, policy: UrlFallbackPolicy) -> Self {
        self.url_fallback = policy;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_cache_size_bytes == 0 {
            return Err("max_cache_size_bytes must be greater than 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.size_evict_target_ratio) {
            return Err("size_evict_target_ratio must be within [0.0, 1.0]".to_string());
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err("cache_dir cannot be empty".to_string());
        }

        if self.bucket.is_empty() {
            return Err("bucket cannot be empty".to_string());
        }

        if self.signed_url_expiry_margin >= self.signed_url_ttl {
            return Err("signed_url_expiry_margin must be smaller than signed_url_ttl".to_string());
        }

        // Signing backoff doubles per attempt with no ceiling, so the retry
        // count has to stay small.
        if self.signing_retries > 10 {
            return Err("signing_retries must be at most 10".to_string());
        }

        if self.max_records == 0 {
            return Err("max_records must be at least 1".to_string());
        }

        Ok(())
    }

    /// Byte count size eviction drives usage down to.
    pub fn size_evict_target_bytes(&self) -> u64 {
        (self.max_cache_size_bytes as f64 * self.size_evict_target_ratio) as u64
    }

    /// Effective lifetime a freshly signed URL is cached for.
    pub fn effective_signed_url_ttl(&self) -> Duration {
        self.signed_url_ttl - self.signed_url_expiry_margin
    }
}

/// What the URL resolver returns once signing retries are exhausted.
///
/// The public-URL guess only works against public buckets; against a private
/// bucket it produces a URL that deterministically fails at fetch time, which
/// the downloader treats as a normal transfer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlFallbackPolicy {
    /// Return the deterministic public URL and let the fetch decide
    PublicUrl,

    /// Report a network error immediately instead of guessing
    FailFast,
}
