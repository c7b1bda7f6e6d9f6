//! Storage trait that all user store backends implement.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::record::{NewUser, UserRecord};

/// Persistence contract for the user collection.
///
/// Implementations must be thread-safe (`Send + Sync`); one instance is
/// shared by every request handler.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persists a new user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a user with the same email exists.
    /// Any other error means the backend failed.
    async fn create(&self, user: NewUser) -> StorageResult<UserRecord>;

    /// Returns every user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn list(&self) -> StorageResult<Vec<UserRecord>>;

    /// Whether the backend is currently able to serve queries.
    ///
    /// Never fails; an unreachable backend reports `false`.
    async fn is_ready(&self) -> bool;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
