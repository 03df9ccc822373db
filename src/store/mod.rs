//! Persistence seam for accounts and configuration.
//!
//! The auth core never owns storage. It reads accounts and config values
//! through these traits and only writes back migrated or reset credentials.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Shared HMAC signing secret for session tokens.
pub const JWT_SECRET: &str = "JWT_SECRET";
/// Host the panel must be reached through.
pub const ALLOWED_HOST: &str = "ALLOWED_HOST";
/// Path prefix the panel must be reached under.
pub const SECURITY_PATH: &str = "SECURITY_PATH";

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("account {0} not found")]
    NotFound(i64),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only projection of an account used to build session claims.
#[derive(ToSchema, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentity {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub deleted: bool,
}

/// Account row as seen by the auth core: identity plus stored credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub identity: AccountIdentity,
    pub pass: Option<String>,
}

/// Typed account lookup filter; unset fields do not constrain the match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountFilter {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub role: Option<String>,
    pub deleted: Option<bool>,
}

impl AccountFilter {
    #[must_use]
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Active (not deleted) admin account with the given username.
    #[must_use]
    pub fn active_admin(username: impl Into<String>) -> Self {
        Self {
            id: None,
            username: Some(username.into()),
            role: Some(ADMIN_ROLE.to_string()),
            deleted: Some(false),
        }
    }

    #[must_use]
    pub fn matches(&self, identity: &AccountIdentity) -> bool {
        self.id.map_or(true, |id| id == identity.id)
            && self
                .username
                .as_deref()
                .map_or(true, |u| u == identity.username)
            && self.role.as_deref().map_or(true, |r| r == identity.role)
            && self.deleted.map_or(true, |d| d == identity.deleted)
    }
}

/// Partial account update; only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountUpdate {
    pub username: Option<String>,
    pub pass: Option<String>,
    pub deleted: Option<bool>,
}

impl AccountUpdate {
    #[must_use]
    pub fn pass(credential: impl Into<String>) -> Self {
        Self {
            pass: Some(credential.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.pass.is_none() && self.deleted.is_none()
    }
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Look up a config value; `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Insert or replace a config value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_account(&self, filter: &AccountFilter)
        -> Result<Option<AccountRecord>, StoreError>;

    /// Write the `Some` fields of `update` to account `id`.
    ///
    /// Concurrent writers are resolved last-write-wins.
    async fn update_account(&self, id: i64, update: &AccountUpdate) -> Result<(), StoreError>;
}
