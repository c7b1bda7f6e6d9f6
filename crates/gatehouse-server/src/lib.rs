pub mod cache;
pub mod config;
pub mod directory;
pub mod error;
pub mod forwarder;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod server;

use std::sync::Arc;
use std::time::Duration;

use gatehouse_storage::{
    InMemoryUserStore, PostgresUserStore, StorageResult, UserStore, postgres::mask_password,
};

pub use cache::{Cache, CacheBackend, CacheError};
pub use config::{
    AppConfig, CacheConfig, ProcessingConfig, RedisConfig, ServerConfig, StorageBackend,
    StorageConfig,
};
pub use directory::{DirectoryError, UserDirectory};
pub use error::ApiError;
pub use forwarder::{ForwardError, ProcessingForwarder};
pub use health::{DependencyProber, HealthAggregator, HealthReport};
pub use observability::init_tracing;
pub use server::{AppState, GatehouseServer, ServerBuilder, build_app};

/// Create the user store selected by `storage.backend`.
///
/// The PostgreSQL store bootstraps its schema here, so an unreachable
/// database fails startup.
pub async fn create_user_store(config: &StorageConfig) -> StorageResult<Arc<dyn UserStore>> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory user store; data is lost on restart");
            Ok(Arc::new(InMemoryUserStore::new()))
        }
        StorageBackend::Postgres => {
            tracing::info!(url = %mask_password(&config.url), "Connecting to PostgreSQL");
            let store = PostgresUserStore::connect(&config.postgres())?;
            store.ensure_schema().await?;
            tracing::info!("✓ PostgreSQL schema ready");
            Ok(Arc::new(store))
        }
    }
}

/// Create a cache backend based on configuration.
///
/// ## Cache Modes
///
/// - **Redis disabled**: local-only cache (DashMap)
/// - **Redis enabled**: Redis pool; an unreachable server at startup is logged
///   and surfaces through the health endpoint rather than switching modes
///
/// Only a pool that cannot be constructed at all falls back to local mode.
pub async fn create_cache_backend(config: &RedisConfig) -> CacheBackend {
    if !config.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return CacheBackend::new_local();
    }

    let url = config.url();
    tracing::info!(url = %mask_password(&url), "Connecting to Redis");

    let timeout = Duration::from_millis(config.timeout_ms);
    let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);

    let mut redis_config = deadpool_redis::Config::from_url(url);
    redis_config.pool = Some(pool_config);

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local cache."
            );
            return CacheBackend::new_local();
        }
    };

    match pool.get().await {
        Ok(_) => tracing::info!("✓ Connected to Redis successfully"),
        Err(e) => tracing::warn!(
            error = %e,
            "Redis not reachable yet; cache reads will fall back to the store"
        ),
    }

    CacheBackend::new_redis(pool)
}
