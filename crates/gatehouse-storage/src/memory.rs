//! In-memory user store.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::record::{NewUser, UserRecord};
use crate::traits::UserStore;

#[derive(Debug, Default)]
struct Inner {
    users: Vec<UserRecord>,
    emails: HashSet<String>,
}

/// Process-local user store.
///
/// Records are kept in insertion order; the email set enforces uniqueness
/// the same way the unique index does in PostgreSQL.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    inner: RwLock<Inner>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub async fn len(&self) -> usize {
        self.inner.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: NewUser) -> StorageResult<UserRecord> {
        let mut inner = self.inner.write().await;
        if inner.emails.contains(&user.email) {
            return Err(StorageError::conflict(format!(
                "User with email '{}' already exists",
                user.email
            )));
        }

        let record = user.into_record();
        inner.emails.insert(record.email.clone());
        inner.users.push(record.clone());
        Ok(record)
    }

    async fn list(&self) -> StorageResult<Vec<UserRecord>> {
        Ok(self.inner.read().await.users.clone())
    }

    async fn is_ready(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
