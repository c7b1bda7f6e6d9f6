//! Storage error types.

/// Errors that can occur during user storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A record with the same unique key already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Failed to reach the storage backend.
    #[error("Connection error: {0}")]
    Connection(String),
}

impl StorageError {
    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Returns `true` if this is a `Conflict` error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` if the backend could not be reached at all.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Database(e) => matches!(
                e,
                sqlx_core::Error::PoolTimedOut | sqlx_core::Error::PoolClosed | sqlx_core::Error::Io(_)
            ),
            _ => false,
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
