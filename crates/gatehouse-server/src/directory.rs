//! User directory: cache-aside reads and write-invalidation over the user store.
//!
//! ## Read path
//!
//! ```text
//! list_users → cache "users" ──hit──→ decoded list
//!                   │ miss / expired / cache fault / undecodable
//!                   ↓
//!               store.list() → cache.set("users", ttl) → list
//! ```
//!
//! Cache faults never fail a read; only a store failure on the miss path does.
//!
//! ## Write path
//!
//! `create_user` persists first, then deletes the `"users"` key. A failed
//! delete is logged and swallowed; the TTL bounds how long a stale list can
//! survive it.

use std::sync::Arc;
use std::time::Duration;

use gatehouse_storage::{NewUser, StorageError, UserRecord, UserStore};
use tracing::{debug, info, warn};

use crate::cache::Cache;

/// Cache key holding the serialized list of all users.
pub const USERS_CACHE_KEY: &str = "users";

/// Failures of directory operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("{0}")]
    Validation(String),

    #[error("user with this email already exists")]
    Conflict,

    #[error(transparent)]
    Store(StorageError),
}

impl From<StorageError> for DirectoryError {
    fn from(err: StorageError) -> Self {
        if err.is_conflict() {
            Self::Conflict
        } else {
            Self::Store(err)
        }
    }
}

pub struct UserDirectory {
    store: Arc<dyn UserStore>,
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn UserStore>, cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { store, cache, ttl }
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    /// Validate, persist, then invalidate the cached list.
    pub async fn create_user(
        &self,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<UserRecord, DirectoryError> {
        let (name, email) = match (non_blank(name), non_blank(email)) {
            (Some(name), Some(email)) => (name, email),
            _ => {
                return Err(DirectoryError::Validation(
                    "Name and email are required".to_string(),
                ));
            }
        };

        let user = self.store.create(NewUser::new(name, email)).await?;
        info!(user_id = %user.id, "user created");

        if let Err(e) = self.cache.invalidate(USERS_CACHE_KEY).await {
            warn!(
                error = %e,
                key = USERS_CACHE_KEY,
                "cache invalidation failed; cached list stays stale until TTL expiry"
            );
        }

        Ok(user)
    }

    /// Cached list of all users, falling back to the store on a miss.
    pub async fn list_users(&self) -> Result<Vec<UserRecord>, DirectoryError> {
        match self.cache.get(USERS_CACHE_KEY).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Vec<UserRecord>>(&bytes) {
                Ok(users) => {
                    debug!(count = users.len(), "users retrieved from cache");
                    return Ok(users);
                }
                Err(e) => warn!(error = %e, "cached user list is undecodable, reloading"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "cache read failed, reading from store"),
        }

        let users = self.store.list().await?;

        match serde_json::to_vec(&users) {
            Ok(bytes) => {
                if let Err(e) = self.cache.set(USERS_CACHE_KEY, bytes, self.ttl).await {
                    warn!(error = %e, "failed to cache user list");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize user list for cache"),
        }

        debug!(
            count = users.len(),
            backend = self.store.backend_name(),
            "users retrieved from store"
        );
        Ok(users)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBackend, CacheError};
    use async_trait::async_trait;
    use gatehouse_storage::{InMemoryUserStore, StorageResult};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(60);

    /// Store wrapper that counts list calls and can be switched to fail.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryUserStore,
        lists: AtomicUsize,
        fail: AtomicBool,
    }

    impl CountingStore {
        fn lists(&self) -> usize {
            self.lists.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UserStore for CountingStore {
        async fn create(&self, user: NewUser) -> StorageResult<UserRecord> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::connection("store down"));
            }
            self.inner.create(user).await
        }

        async fn list(&self) -> StorageResult<Vec<UserRecord>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::connection("store down"));
            }
            self.inner.list().await
        }

        async fn is_ready(&self) -> bool {
            !self.fail.load(Ordering::SeqCst)
        }

        fn backend_name(&self) -> &'static str {
            "counting"
        }
    }

    /// Cache whose reads, writes and deletes all fail.
    struct BrokenCache;

    #[async_trait]
    impl Cache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<Arc<Vec<u8>>>, CacheError> {
            Err(CacheError::Pool("refused".into()))
        }
        async fn set(&self, _: &str, _: Vec<u8>, _: Duration) -> Result<(), CacheError> {
            Err(CacheError::Pool("refused".into()))
        }
        async fn invalidate(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Pool("refused".into()))
        }
        async fn ping(&self) -> Result<(), CacheError> {
            Err(CacheError::Pool("refused".into()))
        }
        fn mode(&self) -> &'static str {
            "broken"
        }
    }

    fn directory() -> (UserDirectory, Arc<CountingStore>, Arc<CacheBackend>) {
        let store = Arc::new(CountingStore::default());
        let cache = Arc::new(CacheBackend::new_local());
        let dir = UserDirectory::new(store.clone(), cache.clone(), TTL);
        (dir, store, cache)
    }

    #[tokio::test]
    async fn test_create_requires_name_and_email() {
        let (dir, store, _) = directory();

        for (name, email) in [
            (None, Some("a@example.com")),
            (Some("Ada"), None),
            (Some(""), Some("a@example.com")),
            (Some("Ada"), Some("   ")),
        ] {
            let err = dir.create_user(name, email).await.unwrap_err();
            assert!(matches!(err, DirectoryError::Validation(_)));
        }
        assert!(store.inner.is_empty().await);
    }

    #[tokio::test]
    async fn test_sequential_creates_are_visible_to_following_lists() {
        let (dir, _, _) = directory();

        for i in 0..3 {
            let email = format!("user{i}@example.com");
            let created = dir.create_user(Some("User"), Some(&email)).await.unwrap();

            let users = dir.list_users().await.unwrap();
            assert_eq!(users.len(), i + 1);
            assert!(users.iter().any(|u| u.id == created.id));
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts_and_leaves_store_unchanged() {
        let (dir, store, _) = directory();
        dir.create_user(Some("Ada"), Some("ada@example.com"))
            .await
            .unwrap();

        let err = dir
            .create_user(Some("Impostor"), Some("ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Conflict));

        let users = store.inner.list().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Ada");
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_hits_store_once_within_ttl_and_again_after() {
        let (dir, store, _) = directory();
        dir.create_user(Some("Ada"), Some("ada@example.com"))
            .await
            .unwrap();

        let first = dir.list_users().await.unwrap();
        assert_eq!(store.lists(), 1);

        tokio::time::advance(Duration::from_secs(30)).await;
        let second = dir.list_users().await.unwrap();
        assert_eq!(store.lists(), 1, "second read within TTL must be a cache hit");
        assert_eq!(first, second);

        tokio::time::advance(Duration::from_secs(31)).await;
        let third = dir.list_users().await.unwrap();
        assert_eq!(store.lists(), 2, "read after TTL must go to the store");
        assert_eq!(first, third);
    }

    #[tokio::test]
    async fn test_create_invalidates_cached_snapshot() {
        let (dir, store, cache) = directory();
        dir.create_user(Some("Ada"), Some("ada@example.com"))
            .await
            .unwrap();
        dir.list_users().await.unwrap();
        assert!(cache.get(USERS_CACHE_KEY).await.unwrap().is_some());

        dir.create_user(Some("Bob"), Some("bob@example.com"))
            .await
            .unwrap();
        assert!(cache.get(USERS_CACHE_KEY).await.unwrap().is_none());

        let users = dir.list_users().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(store.lists(), 2);
    }

    #[tokio::test]
    async fn test_failed_create_does_not_invalidate() {
        let (dir, _, cache) = directory();
        dir.create_user(Some("Ada"), Some("ada@example.com"))
            .await
            .unwrap();
        dir.list_users().await.unwrap();

        dir.create_user(Some("Ada again"), Some("ada@example.com"))
            .await
            .unwrap_err();
        assert!(cache.get(USERS_CACHE_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_broken_cache_is_absorbed() {
        let store = Arc::new(CountingStore::default());
        let dir = UserDirectory::new(store.clone(), Arc::new(BrokenCache), TTL);

        let created = dir
            .create_user(Some("Ada"), Some("ada@example.com"))
            .await
            .expect("invalidation failure must not fail the create");

        let users = dir.list_users().await.expect("cache failure must not fail the read");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, created.id);
        assert_eq!(store.lists(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_cache_entry_falls_back_to_store() {
        let (dir, store, cache) = directory();
        cache
            .set(USERS_CACHE_KEY, b"not json".to_vec(), TTL)
            .await
            .unwrap();

        let users = dir.list_users().await.unwrap();
        assert!(users.is_empty());
        assert_eq!(store.lists(), 1);

        // Repopulated with a valid snapshot
        let bytes = cache.get(USERS_CACHE_KEY).await.unwrap().unwrap();
        assert_eq!(&bytes[..], b"[]");
    }

    #[tokio::test]
    async fn test_store_failure_on_miss_surfaces() {
        let (dir, store, _) = directory();
        store.fail.store(true, Ordering::SeqCst);

        let err = dir.list_users().await.unwrap_err();
        assert!(matches!(err, DirectoryError::Store(_)));

        let err = dir
            .create_user(Some("Ada"), Some("ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Store(_)));
    }
}
