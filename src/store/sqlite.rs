//! SQLite-backed account and config store.

use async_trait::async_trait;
use rand::{rngs::OsRng, RngCore};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    QueryBuilder, Row, Sqlite, SqlitePool,
};
use std::str::FromStr;
use tracing::{debug, info};

use super::{
    AccountFilter, AccountIdentity, AccountRecord, AccountStore, AccountUpdate, ConfigStore,
    StoreError, ADMIN_ROLE, JWT_SECRET,
};
use crate::auth::legacy::legacy_digest;

/// Account seeded on first start; its legacy digest is migrated on first login.
pub const DEFAULT_ADMIN: &str = "sysadmin";

const JWT_SECRET_BYTES: usize = 16;

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database behind `dsn` and apply the schema.
    ///
    /// # Errors
    /// Returns an error if the DSN is invalid, the database cannot be opened,
    /// or the schema cannot be applied.
    pub async fn connect(dsn: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(dsn)?.create_if_missing(true);
        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if dsn.contains(":memory:") {
            // every connection to an in-memory database gets its own database
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and apply the schema.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be applied.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS account (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT    NOT NULL UNIQUE DEFAULT '',
                pass        TEXT    NOT NULL        DEFAULT '',
                role        TEXT    NOT NULL        DEFAULT 'user',
                deleted     INTEGER NOT NULL        DEFAULT 0,
                create_time TIMESTAMP               DEFAULT CURRENT_TIMESTAMP,
                update_time TIMESTAMP               DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS config (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                key         TEXT NOT NULL UNIQUE DEFAULT '',
                value       TEXT NOT NULL        DEFAULT '',
                remark      TEXT NOT NULL        DEFAULT '',
                create_time TIMESTAMP            DEFAULT CURRENT_TIMESTAMP,
                update_time TIMESTAMP            DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        let seeded = sqlx::query(
            r"
            INSERT INTO account (id, username, pass, role)
            SELECT 1, ?, ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM account WHERE id = 1)
            ",
        )
        .bind(DEFAULT_ADMIN)
        .bind(legacy_digest(DEFAULT_ADMIN))
        .bind(ADMIN_ROLE)
        .execute(&self.pool)
        .await?;
        if seeded.rows_affected() > 0 {
            info!("Seeded default admin account '{DEFAULT_ADMIN}'");
        }

        let mut secret = [0u8; JWT_SECRET_BYTES];
        OsRng
            .try_fill_bytes(&mut secret)
            .map_err(|e| StoreError::Unavailable(format!("failed to generate JWT secret: {e}")))?;
        sqlx::query(
            r"
            INSERT INTO config (key, value, remark)
            SELECT ?, ?, 'JWT Secret'
            WHERE NOT EXISTS (SELECT 1 FROM config WHERE key = ?)
            ",
        )
        .bind(JWT_SECRET)
        .bind(hex::encode(secret))
        .bind(JWT_SECRET)
        .execute(&self.pool)
        .await?;

        debug!("SQLite schema ready");
        Ok(())
    }
}

fn account_from_row(row: &SqliteRow) -> Result<AccountRecord, sqlx::Error> {
    let pass: String = row.try_get("pass")?;
    Ok(AccountRecord {
        identity: AccountIdentity {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            role: row.try_get("role")?,
            deleted: row.try_get::<i64, _>("deleted")? != 0,
        },
        pass: if pass.is_empty() { None } else { Some(pass) },
    })
}

#[async_trait]
impl ConfigStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM config WHERE key = ? LIMIT 1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|row| row.try_get::<String, _>("value"))
            .transpose()?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO config (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, update_time = CURRENT_TIMESTAMP
            ",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for SqliteStore {
    async fn find_account(
        &self,
        filter: &AccountFilter,
    ) -> Result<Option<AccountRecord>, StoreError> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, username, pass, role, deleted FROM account WHERE 1 = 1");
        if let Some(id) = filter.id {
            query.push(" AND id = ").push_bind(id);
        }
        if let Some(username) = &filter.username {
            query.push(" AND username = ").push_bind(username.clone());
        }
        if let Some(role) = &filter.role {
            query.push(" AND role = ").push_bind(role.clone());
        }
        if let Some(deleted) = filter.deleted {
            query.push(" AND deleted = ").push_bind(i64::from(deleted));
        }
        query.push(" ORDER BY id LIMIT 1");

        let row = query.build().fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(account_from_row).transpose()?)
    }

    async fn update_account(&self, id: i64, update: &AccountUpdate) -> Result<(), StoreError> {
        if update.is_empty() {
            return Ok(());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE account SET ");
        let mut fields = query.separated(", ");
        if let Some(username) = &update.username {
            fields.push("username = ").push_bind_unseparated(username.clone());
        }
        if let Some(pass) = &update.pass {
            fields.push("pass = ").push_bind_unseparated(pass.clone());
        }
        if let Some(deleted) = update.deleted {
            fields
                .push("deleted = ")
                .push_bind_unseparated(i64::from(deleted));
        }
        fields.push("update_time = CURRENT_TIMESTAMP");
        query.push(" WHERE id = ").push_bind(id);

        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
