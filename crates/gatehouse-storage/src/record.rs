//! User record types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A persisted user.
///
/// `created_at` is assigned by the store when the record is created and
/// never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Input for creating a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Build the record that will be persisted, with a fresh id and timestamp.
    pub fn into_record(self) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            name: self.name,
            email: self.email,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}
