//! In-process store, useful for embedding and for exercising the auth flow
//! without a database.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{AccountFilter, AccountRecord, AccountStore, AccountUpdate, ConfigStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    config: RwLock<HashMap<String, String>>,
    accounts: RwLock<BTreeMap<i64, AccountRecord>>,
    account_writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_account(&self, record: AccountRecord) {
        self.accounts
            .write()
            .await
            .insert(record.identity.id, record);
    }

    pub async fn account(&self, id: i64) -> Option<AccountRecord> {
        self.accounts.read().await.get(&id).cloned()
    }

    /// Number of successful `update_account` calls so far.
    pub fn account_writes(&self) -> usize {
        self.account_writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent `update_account` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.config.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.config
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_account(
        &self,
        filter: &AccountFilter,
    ) -> Result<Option<AccountRecord>, StoreError> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|record| filter.matches(&record.identity))
            .cloned())
    }

    async fn update_account(&self, id: i64, update: &AccountUpdate) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }

        let mut accounts = self.accounts.write().await;
        let record = accounts.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if let Some(username) = &update.username {
            record.identity.username.clone_from(username);
        }
        if let Some(pass) = &update.pass {
            record.pass = Some(pass.clone());
        }
        if let Some(deleted) = update.deleted {
            record.identity.deleted = deleted;
        }

        self.account_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
