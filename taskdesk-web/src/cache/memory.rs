//! In-process cache backend
//!
//! Used whenever Redis is not configured or unreachable. Expiry is checked on
//! every read, and a background sweep drops entries nobody reads again. At
//! capacity the least recently used entry is evicted, but revocation entries
//! are never chosen; they only leave when they expire.

use super::{glob_match, keys, CacheBackend, CacheResult, TTL_MISSING, TTL_PERSISTENT};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{interval, Instant};
use tracing::{debug, info};

const DEFAULT_MAX_ENTRIES: usize = 10_000;
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Cache entry with expiration
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: String,
    pub expires_at: Option<Instant>,
    pub last_accessed: Instant,
}

impl CacheEntry {
    pub fn new(value: String, ttl: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            value,
            expires_at: ttl.map(|duration| now + duration),
            last_accessed: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| Instant::now() >= expires_at)
            .unwrap_or(false)
    }
}

type Entries = HashMap<String, CacheEntry>;

/// In-memory cache with TTL and LRU eviction
#[derive(Debug)]
pub struct MemoryCache {
    entries: Arc<RwLock<Entries>>,
    max_size: usize,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(max_size: usize) -> Self {
        let cache = Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_size: max_size.max(1),
        };

        if tokio::runtime::Handle::try_current().is_ok() {
            cache.start_cleanup_task();
        }
        cache
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Look up a live entry, removing it if it has expired
    async fn live<R>(&self, key: &str, f: impl FnOnce(&mut CacheEntry) -> R) -> Option<R> {
        let mut entries = self.entries.write().await;
        if entries.get(key)?.is_expired() {
            entries.remove(key);
            debug!(key, "Cache entry expired and removed");
            return None;
        }
        entries.get_mut(key).map(f)
    }

    fn evict_lru(&self, entries: &mut Entries) {
        let lru_key = entries
            .iter()
            .filter(|(key, _)| !keys::is_revocation(key))
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone());

        if let Some(key) = lru_key {
            entries.remove(&key);
            debug!(key = %key, "Evicted LRU cache entry");
        }
    }

    fn insert(&self, entries: &mut Entries, key: &str, entry: CacheEntry) {
        if entries.len() >= self.max_size && !entries.contains_key(key) {
            // expired entries go first, then the least recently used
            entries.retain(|_, e| !e.is_expired());
            if entries.len() >= self.max_size {
                self.evict_lru(entries);
            }
        }
        entries.insert(key.to_string(), entry);
    }

    fn start_cleanup_task(&self) {
        let entries: Weak<RwLock<Entries>> = Arc::downgrade(&self.entries);

        tokio::spawn(async move {
            let mut interval = interval(SWEEP_INTERVAL);
            // the first tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let Some(entries) = entries.upgrade() else {
                    break;
                };

                let mut entries = entries.write().await;
                let initial_size = entries.len();
                entries.retain(|_, entry| !entry.is_expired());

                let removed_count = initial_size - entries.len();
                if removed_count > 0 {
                    info!("Cache cleanup: removed {} expired entries", removed_count);
                }
            }
        });
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self
            .live(key, |entry| {
                entry.last_accessed = Instant::now();
                entry.value.clone()
            })
            .await)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let mut entries = self.entries.write().await;
        self.insert(&mut entries, key, CacheEntry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<bool> {
        let removed = self.entries.write().await.remove(key);
        Ok(removed.is_some_and(|entry| !entry.is_expired()))
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.live(key, |_| ()).await.is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        Ok(self
            .live(key, |entry| entry.expires_at = Some(Instant::now() + ttl))
            .await
            .is_some())
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        let remaining = self
            .live(key, |entry| {
                entry
                    .expires_at
                    .map(|at| at.saturating_duration_since(Instant::now()))
            })
            .await;

        Ok(match remaining {
            None => TTL_MISSING,
            Some(None) => TTL_PERSISTENT,
            // round up so a live key never reports 0
            Some(Some(left)) => super::ttl_secs(left) as i64,
        })
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> CacheResult<i64> {
        let mut entries = self.entries.write().await;
        let current = match entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.clone()),
            _ => None,
        };

        let (count, entry) = match current {
            Some(mut entry) => {
                let count = entry
                    .value
                    .parse::<i64>()
                    .map_err(|e| super::cache_error("incr", e))?
                    + 1;
                entry.value = count.to_string();
                entry.last_accessed = Instant::now();
                (count, entry)
            }
            None => (1, CacheEntry::new("1".to_string(), Some(ttl))),
        };

        self.insert(&mut entries, key, entry);
        Ok(count)
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !glob_match(pattern, key));
        Ok((before - entries.len()) as u64)
    }

    async fn flush_all(&self) -> CacheResult<()> {
        self.entries.write().await.clear();
        info!("Cache cleared");
        Ok(())
    }
}
