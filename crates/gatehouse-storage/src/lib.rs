//! # gatehouse-storage
//!
//! Persistence of user records for the Gatehouse gateway.
//!
//! The main trait is [`UserStore`], which defines the contract for:
//! - Creating a user (email uniqueness enforced by the backend)
//! - Listing all users in creation order
//! - Reporting readiness for health checks
//!
//! ## Storage Backends
//!
//! - [`PostgresUserStore`]: PostgreSQL via sqlx, the production backend
//! - [`InMemoryUserStore`]: process-local, for development and tests
//!
//! ## Example
//!
//! ```ignore
//! use gatehouse_storage::{NewUser, UserStore, StorageError};
//!
//! async fn register(store: &dyn UserStore) -> Result<(), StorageError> {
//!     let user = store.create(NewUser::new("Ada", "ada@example.com")).await?;
//!     tracing::info!(id = %user.id, "registered");
//!     Ok(())
//! }
//! ```

mod error;
pub mod memory;
pub mod postgres;
mod record;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryUserStore;
pub use postgres::{PostgresConfig, PostgresUserStore};
pub use record::{NewUser, UserRecord};
pub use traits::UserStore;
