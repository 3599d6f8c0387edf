//! Result cache for funding records.
//!
//! ```text
//! CacheService            <- JSON encoding, hit/miss counters, error absorption on reads
//!   └── dyn CacheBackend  <- raw string store with per-key TTL
//!         ├── InMemoryCache
//!         └── RedisCache (feature "redis")
//! ```
//!
//! Read failures are logged and reported as a miss. Write failures are
//! returned to the caller, which decides whether they matter; the funding
//! orchestrator logs and drops them.

mod memory;
#[cfg(feature = "redis")]
mod redis_store;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::Platform;

pub use memory::InMemoryCache;
#[cfg(feature = "redis")]
pub use redis_store::RedisCache;

/// Builds the cache key for a funding lookup.
///
/// The username keeps the caller's letter case, so `User` and `user` occupy
/// separate entries.
pub fn funding_cache_key(platform: Platform, username: &str) -> String {
    format!("funding:{}:{}", platform.as_str(), username)
}

/// Errors raised by cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key/value store with per-key expiry.
pub trait CacheBackend: Send + Sync {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, CacheError>> + Send + 'a>>;

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: String,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>>;

    fn delete<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>>;

    fn ping<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>>;
}

/// Point-in-time hit/miss counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub total: u64,
    /// Percentage with two decimals, e.g. `"66.67%"`.
    pub hit_rate: String,
}

/// Typed cache facade shared by the request handlers.
#[derive(Clone)]
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl CacheService {
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// In-memory cache with the given default TTL.
    pub fn in_memory(default_ttl: Duration) -> Self {
        Self::new(Arc::new(InMemoryCache::new()), default_ttl)
    }

    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Reads and decodes `key`. Backend and decode failures count as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(error) => {
                tracing::error!(key, error = %error, "cache get failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(error) => {
                tracing::error!(key, error = %error, "cached value could not be decoded");
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Encodes and stores `value`; `ttl` falls back to the default TTL.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let encoded = serde_json::to_string(value)?;
        let ttl = ttl.unwrap_or(self.default_ttl);
        self.backend.set(key, encoded, ttl).await
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.backend.delete(key).await
    }

    /// Returns true when the backend answers a ping.
    pub async fn ping(&self) -> bool {
        match self.backend.ping().await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(error = %error, "cache ping failed");
                false
            }
        }
    }

    pub fn metrics(&self) -> CacheMetrics {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let rate = if total > 0 {
            hits as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        CacheMetrics {
            hits,
            misses,
            total,
            hit_rate: format!("{rate:.2}%"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingBackend;

    impl CacheBackend for FailingBackend {
        fn get<'a>(
            &'a self,
            _key: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<Option<String>, CacheError>> + Send + 'a>>
        {
            Box::pin(async { Err(CacheError::Backend(String::from("connection refused"))) })
        }

        fn set<'a>(
            &'a self,
            _key: &'a str,
            _value: String,
            _ttl: Duration,
        ) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>> {
            Box::pin(async { Err(CacheError::Backend(String::from("connection refused"))) })
        }

        fn delete<'a>(
            &'a self,
            _key: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>> {
            Box::pin(async { Err(CacheError::Backend(String::from("connection refused"))) })
        }

        fn ping<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>> {
            Box::pin(async { Err(CacheError::Backend(String::from("connection refused"))) })
        }
    }

    #[test]
    fn key_preserves_username_case() {
        assert_eq!(funding_cache_key(Platform::Github, "User"), "funding:github:User");
        assert_ne!(
            funding_cache_key(Platform::Github, "User"),
            funding_cache_key(Platform::Github, "user")
        );
    }

    #[tokio::test]
    async fn counts_hits_and_misses() {
        let cache = CacheService::in_memory(Duration::from_secs(60));

        assert_eq!(cache.get::<u32>("k").await, None);
        cache.set("k", &7_u32, None).await.expect("set");
        assert_eq!(cache.get::<u32>("k").await, Some(7));
        assert_eq!(cache.get::<u32>("k").await, Some(7));

        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 2);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.total, 3);
        assert_eq!(metrics.hit_rate, "66.67%");
    }

    #[tokio::test]
    async fn undecodable_entry_is_a_miss() {
        let cache = CacheService::in_memory(Duration::from_secs(60));
        cache.set("k", &"not a number", None).await.expect("set");

        assert_eq!(cache.get::<u32>("k").await, None);
        assert_eq!(cache.metrics().misses, 1);
    }

    #[tokio::test]
    async fn backend_failures_are_absorbed_on_read_and_reported_on_write() {
        let cache = CacheService::new(Arc::new(FailingBackend), Duration::from_secs(60));

        assert_eq!(cache.get::<u32>("k").await, None);
        assert!(cache.set("k", &1_u32, None).await.is_err());
        assert!(!cache.ping().await);
        assert_eq!(cache.metrics().total, 0);
    }

    #[tokio::test]
    async fn empty_metrics_report_zero_rate() {
        let cache = CacheService::in_memory(Duration::from_secs(60));
        assert_eq!(cache.metrics().hit_rate, "0.00%");
    }
}
