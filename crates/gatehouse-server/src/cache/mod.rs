//! Key/value cache used by the user directory.
//!
//! ## Modes
//!
//! - **Local (DashMap)**: in-process, per instance, used when Redis is disabled
//! - **Redis**: shared across instances, TTL enforced by Redis itself
//!
//! Components depend on the [`Cache`] trait rather than on a backend, so
//! tests can substitute fakes that fail on demand.

pub mod backend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use backend::{CacheBackend, CachedEntry};

/// Errors surfaced by cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// No connection could be obtained from the pool.
    #[error("cache connection unavailable: {0}")]
    Pool(String),

    /// The cache server rejected or failed the command.
    #[error("cache command failed: {0}")]
    Command(#[from] redis::RedisError),
}

/// Cache operations the gateway relies on.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns the value if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<Arc<Vec<u8>>>, CacheError>;

    /// Stores `value` under `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;

    /// Liveness round-trip.
    async fn ping(&self) -> Result<(), CacheError>;

    /// "local" or "redis".
    fn mode(&self) -> &'static str;
}
