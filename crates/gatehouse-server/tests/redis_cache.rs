//! Integration tests for the Redis cache mode.
//!
//! Tests use testcontainers to spin up a real Redis instance.
//!
//! Run with `cargo test -p gatehouse-server --test redis_cache -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use gatehouse_server::{Cache, CacheBackend, RedisConfig, UserDirectory, create_cache_backend};
use gatehouse_storage::InMemoryUserStore;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, u16)> = OnceCell::const_new();

async fn redis_config() -> RedisConfig {
    let (_, port) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");
            let port = container.get_host_port_ipv4(6379).await.expect("get port");
            (container, port)
        })
        .await;

    RedisConfig {
        enabled: true,
        host: "127.0.0.1".to_string(),
        port: *port,
        ..RedisConfig::default()
    }
}

async fn redis_cache() -> CacheBackend {
    let cache = create_cache_backend(&redis_config().await).await;
    assert_eq!(cache.mode(), "redis");
    cache
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_get_set_invalidate() {
    let cache = redis_cache().await;
    cache.ping().await.unwrap();

    cache
        .set("redis_roundtrip", b"value".to_vec(), Duration::from_secs(60))
        .await
        .unwrap();
    let value = cache.get("redis_roundtrip").await.unwrap();
    assert_eq!(value, Some(Arc::new(b"value".to_vec())));

    cache.invalidate("redis_roundtrip").await.unwrap();
    assert!(cache.get("redis_roundtrip").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_ttl_expiry() {
    let cache = redis_cache().await;
    cache
        .set("redis_expiring", b"value".to_vec(), Duration::from_secs(1))
        .await
        .unwrap();
    assert!(cache.get("redis_expiring").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert!(cache.get("redis_expiring").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_directories_share_invalidation_through_redis() {
    // Two gateway instances over one store and one Redis
    let store = Arc::new(InMemoryUserStore::new());
    let first = UserDirectory::new(
        store.clone(),
        Arc::new(redis_cache().await),
        Duration::from_secs(60),
    );
    let second = UserDirectory::new(
        store.clone(),
        Arc::new(redis_cache().await),
        Duration::from_secs(60),
    );
    second.cache().invalidate("users").await.unwrap();

    first
        .create_user(Some("Ada"), Some("ada@example.com"))
        .await
        .unwrap();
    assert_eq!(second.list_users().await.unwrap().len(), 1);

    first
        .create_user(Some("Bob"), Some("bob@example.com"))
        .await
        .unwrap();
    assert_eq!(second.list_users().await.unwrap().len(), 2);
}
