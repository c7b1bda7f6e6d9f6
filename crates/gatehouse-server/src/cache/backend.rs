//! Cache backend implementation with local (DashMap) and Redis modes.

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::{Cache, CacheError};

/// A cached entry with TTL support.
///
/// The data is wrapped in `Arc` to allow cheap cloning on cache hits,
/// avoiding copies of the serialized user list.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<Vec<u8>>,
    pub expires_at: Instant,
}

impl CachedEntry {
    /// Create a new cached entry expiring `ttl` from now.
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data: Arc::new(data),
            expires_at: Instant::now() + ttl,
        }
    }

    /// Check if this entry has expired.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Cache backend.
///
/// | Operation | Local Mode | Redis Mode |
/// |-----------|------------|------------|
/// | GET       | <1µs       | ~1ms       |
/// | SET       | <1µs       | ~1ms       |
/// | DELETE    | <1µs       | ~1ms       |
///
/// Redis writes and deletes are awaited: a create must not report success
/// before the stale list is gone.
#[derive(Clone)]
pub enum CacheBackend {
    /// Single-instance: local DashMap only
    Local(Arc<DashMap<String, CachedEntry>>),

    /// Multi-instance: shared Redis
    Redis(Pool),
}

impl CacheBackend {
    /// Create a new local-only cache backend.
    pub fn new_local() -> Self {
        CacheBackend::Local(Arc::new(DashMap::new()))
    }

    /// Create a new Redis-backed cache backend.
    pub fn new_redis(redis_pool: Pool) -> Self {
        CacheBackend::Redis(redis_pool)
    }

    /// Number of entries held locally (0 in Redis mode).
    pub fn local_entries(&self) -> usize {
        match self {
            CacheBackend::Local(map) => map.len(),
            CacheBackend::Redis(_) => 0,
        }
    }

    async fn connection(pool: &Pool) -> Result<deadpool_redis::Connection, CacheError> {
        pool.get().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to get Redis connection");
            CacheError::Pool(e.to_string())
        })
    }
}

#[async_trait]
impl Cache for CacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Arc<Vec<u8>>>, CacheError> {
        let result = match self {
            CacheBackend::Local(map) => {
                let hit = map.get(key).and_then(|entry| {
                    (!entry.is_expired()).then(|| Arc::clone(&entry.data))
                });
                if hit.is_none() {
                    // Remove expired entry
                    map.remove_if(key, |_, entry| entry.is_expired());
                }
                hit
            }
            CacheBackend::Redis(redis) => {
                let mut conn = Self::connection(redis).await?;
                conn.get::<_, Option<Vec<u8>>>(key).await.map_err(|e| {
                    tracing::warn!(key = %key, error = %e, "Redis GET error");
                    CacheError::from(e)
                })?
                .map(Arc::new)
            }
        };

        if result.is_some() {
            tracing::debug!(key = %key, mode = self.mode(), "cache hit");
            crate::metrics::record_cache_hit(self.mode());
        } else {
            tracing::debug!(key = %key, mode = self.mode(), "cache miss");
            crate::metrics::record_cache_miss(self.mode());
        }

        Ok(result)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        match self {
            CacheBackend::Local(map) => {
                map.insert(key.to_string(), CachedEntry::new(value, ttl));
            }
            CacheBackend::Redis(redis) => {
                let mut conn = Self::connection(redis).await?;
                // Redis expiry has one-second granularity
                let ttl_secs = ttl.as_secs().max(1);
                conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
                tracing::debug!(key = %key, ttl_secs = %ttl_secs, "cache set (redis)");
            }
        }
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        match self {
            CacheBackend::Local(map) => {
                map.remove(key);
                tracing::debug!(key = %key, "cache invalidated (local)");
            }
            CacheBackend::Redis(redis) => {
                let mut conn = Self::connection(redis).await?;
                conn.del::<_, ()>(key).await?;
                tracing::debug!(key = %key, "cache invalidated (redis)");
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        match self {
            CacheBackend::Local(_) => Ok(()),
            CacheBackend::Redis(redis) => {
                let mut conn = Self::connection(redis).await?;
                let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
                Ok(())
            }
        }
    }

    fn mode(&self) -> &'static str {
        match self {
            CacheBackend::Local(_) => "local",
            CacheBackend::Redis(_) => "redis",
        }
    }
}
