//! Redis cache backend
//!
//! Connections come from a `deadpool-redis` pool. [`connect_cache`] picks this
//! backend when a URL is configured and reachable, and otherwise falls back
//! to the in-process map.

use super::{cache_error, ttl_secs, CacheBackend, CacheResult, CacheStore};
use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime};
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const POOL_SIZE: usize = 16;
const POOL_TIMEOUT: Duration = Duration::from_secs(2);
const SCAN_BATCH: usize = 500;

pub struct RedisCache {
    pool: Pool,
}

impl RedisCache {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> CacheResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| cache_error("connection", e))
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| cache_error("get", e))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let result = match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)).await,
            None => conn.set::<_, _, ()>(key, value).await,
        };
        result.map_err(|e| cache_error("set", e))
    }

    async fn del(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.del(key).await.map_err(|e| cache_error("del", e))?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        conn.exists::<_, bool>(key)
            .await
            .map_err(|e| cache_error("exists", e))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        conn.expire::<_, bool>(key, ttl_secs(ttl) as i64)
            .await
            .map_err(|e| cache_error("expire", e))
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.conn().await?;
        conn.ttl::<_, i64>(key)
            .await
            .map_err(|e| cache_error("ttl", e))
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> CacheResult<i64> {
        let mut conn = self.conn().await?;
        let count: i64 = conn
            .incr(key, 1)
            .await
            .map_err(|e| cache_error("incr", e))?;
        if count == 1 {
            conn.expire::<_, ()>(key, ttl_secs(ttl) as i64)
                .await
                .map_err(|e| cache_error("expire", e))?;
        }
        Ok(count)
    }

    /// Walks the keyspace with `SCAN` so large databases are never blocked
    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut conn = self.conn().await?;
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| cache_error("scan", e))?;

            if !batch.is_empty() {
                let deleted: u64 = conn.del(&batch).await.map_err(|e| cache_error("del", e))?;
                removed += deleted;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(pattern, removed, "Deleted keys by pattern");
        Ok(removed)
    }

    async fn flush_all(&self) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(|e| cache_error("flushdb", e))
    }
}

/// Build the cache store for the configured Redis URL
///
/// Without a URL, or if Redis cannot be reached at startup, the server runs
/// on the in-process backend.
pub async fn connect_cache(redis_url: Option<&str>) -> CacheStore {
    let Some(url) = redis_url.filter(|u| !u.trim().is_empty()) else {
        info!("Redis not configured, using in-process cache");
        return CacheStore::memory();
    };

    info!("Connecting to Redis");

    let mut redis_config = Config::from_url(url);
    let pool_config = redis_config
        .pool
        .get_or_insert_with(|| PoolConfig::new(POOL_SIZE));
    pool_config.timeouts.wait = Some(POOL_TIMEOUT);
    pool_config.timeouts.create = Some(POOL_TIMEOUT);
    pool_config.timeouts.recycle = Some(POOL_TIMEOUT);

    let pool = match redis_config.create_pool(Some(Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            warn!(error = %e, "Failed to create Redis pool. Falling back to in-process cache.");
            return CacheStore::memory();
        }
    };

    match pool.get().await {
        Ok(_) => {
            info!("Connected to Redis");
            CacheStore::new(Arc::new(RedisCache::new(pool)))
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to Redis. Falling back to in-process cache.");
            CacheStore::memory()
        }
    }
}
