//! Cache-aside store
//!
//! Backends report failures through [`CacheResult`]; [`CacheStore`] is the
//! handle the rest of the server uses and turns every failure into a logged
//! default, so the cache is never the reason a request fails.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use taskdesk_core::TaskdeskError;
use tracing::{debug, warn};

pub use memory::MemoryCache;
pub use self::redis::{connect_cache, RedisCache};

pub type CacheResult<T> = Result<T, TaskdeskError>;

/// Remaining lifetime reported for a key that exists without an expiry
pub const TTL_PERSISTENT: i64 = -1;
/// Remaining lifetime reported for a missing key
pub const TTL_MISSING: i64 = -2;

/// Key/value operations shared by the in-process and Redis backends
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short backend name for logs and the health endpoint
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value`; `None` keeps it until deleted
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()>;

    /// Returns whether a key was removed
    async fn del(&self, key: &str) -> CacheResult<bool>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Returns false when the key does not exist
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// Seconds left, [`TTL_PERSISTENT`] or [`TTL_MISSING`]
    async fn ttl(&self, key: &str) -> CacheResult<i64>;

    /// Increment a counter, setting `ttl` when the increment created it
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> CacheResult<i64>;

    /// Delete every key matching a `*` glob; returns the number removed
    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64>;

    async fn flush_all(&self) -> CacheResult<()>;
}

pub(crate) fn cache_error(operation: &str, err: impl std::fmt::Display) -> TaskdeskError {
    TaskdeskError::Cache {
        message: format!("{} failed: {}", operation, err),
    }
}

/// Whole seconds for a backend that only takes seconds, never below one
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 || secs == 0 {
        secs + 1
    } else {
        secs
    }
}

/// Match `key` against a glob where `*` spans any run of characters
pub(crate) fn glob_match(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = key.strip_prefix(first) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // no wildcard at all
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

/// Cache handle that never fails
///
/// Values are stored as JSON text. Every backend error is logged at `warn`
/// and converted into the neutral result for that operation.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Store backed by a fresh in-process map
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "Cache get failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Cache value could not be encoded");
                return false;
            }
        };
        match self.backend.set(key, &raw, ttl).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Cache set failed");
                false
            }
        }
    }

    pub async fn del(&self, key: &str) -> bool {
        self.backend.del(key).await.unwrap_or_else(|e| {
            warn!(key, error = %e, "Cache del failed");
            false
        })
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.backend.exists(key).await.unwrap_or_else(|e| {
            warn!(key, error = %e, "Cache exists failed");
            false
        })
    }

    pub async fn expire(&self, key: &str, ttl: Duration) -> bool {
        self.backend.expire(key, ttl).await.unwrap_or_else(|e| {
            warn!(key, error = %e, "Cache expire failed");
            false
        })
    }

    pub async fn ttl(&self, key: &str) -> i64 {
        self.backend.ttl(key).await.unwrap_or_else(|e| {
            warn!(key, error = %e, "Cache ttl failed");
            TTL_MISSING
        })
    }

    /// Counter for rate limiting; 0 when the backend is unavailable
    pub async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> i64 {
        self.backend
            .incr_with_expiry(key, ttl)
            .await
            .unwrap_or_else(|e| {
                warn!(key, error = %e, "Cache increment failed");
                0
            })
    }

    pub async fn delete_pattern(&self, pattern: &str) -> u64 {
        self.backend
            .delete_pattern(pattern)
            .await
            .unwrap_or_else(|e| {
                warn!(pattern, error = %e, "Cache pattern delete failed");
                0
            })
    }

    pub async fn flush_all(&self) -> bool {
        match self.backend.flush_all().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Cache flush failed");
                false
            }
        }
    }
}

/// Cache key generators
pub mod keys {
    use std::time::Duration;

    /// Lifetime of a cached identity
    pub const USER_TTL: Duration = Duration::from_secs(3600);

    pub fn user(id: &str) -> String {
        format!("user:{}", id)
    }

    const BLACKLIST_PREFIX: &str = "blacklist:";

    pub fn blacklist(token: &str) -> String {
        format!("{}{}", BLACKLIST_PREFIX, token)
    }

    /// Revocations must outlive the token they block, so size-bounded
    /// backends never evict them early
    pub fn is_revocation(key: &str) -> bool {
        key.starts_with(BLACKLIST_PREFIX)
    }

    /// Every cached identity
    pub const ALL_USERS: &str = "user:*";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    /// Backend whose every call fails
    struct Broken;

    #[async_trait]
    impl CacheBackend for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        async fn get(&self, _: &str) -> CacheResult<Option<String>> {
            Err(cache_error("get", "down"))
        }
        async fn set(&self, _: &str, _: &str, _: Option<Duration>) -> CacheResult<()> {
            Err(cache_error("set", "down"))
        }
        async fn del(&self, _: &str) -> CacheResult<bool> {
            Err(cache_error("del", "down"))
        }
        async fn exists(&self, _: &str) -> CacheResult<bool> {
            Err(cache_error("exists", "down"))
        }
        async fn expire(&self, _: &str, _: Duration) -> CacheResult<bool> {
            Err(cache_error("expire", "down"))
        }
        async fn ttl(&self, _: &str) -> CacheResult<i64> {
            Err(cache_error("ttl", "down"))
        }
        async fn incr_with_expiry(&self, _: &str, _: Duration) -> CacheResult<i64> {
            Err(cache_error("incr", "down"))
        }
        async fn delete_pattern(&self, _: &str) -> CacheResult<u64> {
            Err(cache_error("keys", "down"))
        }
        async fn flush_all(&self) -> CacheResult<()> {
            Err(cache_error("flushall", "down"))
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        tags: Vec<String>,
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("user:*", "user:42"));
        assert!(glob_match("user:*", "user:"));
        assert!(!glob_match("user:*", "blacklist:user:42"));
        assert!(glob_match("*:42", "user:42"));
        assert!(glob_match("a*b*c", "aXXbYYc"));
        assert!(!glob_match("a*b*c", "aXXcYYb"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
        assert!(glob_match("*", "anything"));
    }

    #[test]
    fn test_ttl_secs_rounds_up() {
        assert_eq!(ttl_secs(Duration::from_secs(3600)), 3600);
        assert_eq!(ttl_secs(Duration::from_millis(1500)), 2);
        assert_eq!(ttl_secs(Duration::ZERO), 1);
    }

    #[tokio::test]
    async fn test_round_trip_preserves_structure() {
        let store = CacheStore::memory();
        let profile = Profile {
            name: "Ada".to_string(),
            tags: vec!["qa".to_string(), "night".to_string()],
        };

        assert!(store.set("profile:1", &profile, Some(Duration::from_secs(60))).await);
        assert_eq!(store.get::<Profile>("profile:1").await, Some(profile));
    }

    #[tokio::test]
    async fn test_failures_become_defaults() {
        let store = CacheStore::new(Arc::new(Broken));

        assert_eq!(store.get::<String>("k").await, None);
        assert!(!store.set("k", "v", None).await);
        assert!(!store.del("k").await);
        assert!(!store.exists("k").await);
        assert!(!store.expire("k", Duration::from_secs(1)).await);
        assert_eq!(store.ttl("k").await, TTL_MISSING);
        assert_eq!(store.incr_with_expiry("k", Duration::from_secs(1)).await, 0);
        assert_eq!(store.delete_pattern("*").await, 0);
        assert!(!store.flush_all().await);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let store = CacheStore::memory();
        store.set("n", &5, None).await;
        assert_eq!(store.get::<Profile>("n").await, None);
        assert_eq!(store.get::<i32>("n").await, Some(5));
    }
}
