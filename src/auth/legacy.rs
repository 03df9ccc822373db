//! Legacy SHA-224 credentials and their one-shot migration to Argon2id.

use sha2::{Digest, Sha224};
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};

use super::password::{hash_password, ARGON2ID_PREFIX};
use crate::store::{AccountStore, AccountUpdate};

pub const LEGACY_DIGEST_HEX_LEN: usize = 56;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialScheme {
    Argon2id,
    LegacySha224,
    Unknown,
}

/// Hex SHA-224 digest of `password`, as stored by older installs.
#[must_use]
pub fn legacy_digest(password: &str) -> String {
    hex::encode(Sha224::digest(password.as_bytes()))
}

#[must_use]
pub fn is_legacy(stored: &str) -> bool {
    !stored.starts_with(ARGON2ID_PREFIX)
        && stored.len() == LEGACY_DIGEST_HEX_LEN
        && stored.bytes().all(|b| b.is_ascii_hexdigit())
}

#[must_use]
pub fn classify(stored: &str) -> CredentialScheme {
    if stored.starts_with(ARGON2ID_PREFIX) {
        CredentialScheme::Argon2id
    } else if is_legacy(stored) {
        CredentialScheme::LegacySha224
    } else {
        CredentialScheme::Unknown
    }
}

/// Compare `password` against a stored legacy digest in constant time.
#[must_use]
pub fn verify_legacy(password: &str, stored: &str) -> bool {
    let candidate = legacy_digest(password);
    let stored = stored.to_ascii_lowercase();
    bool::from(candidate.as_bytes().ct_eq(stored.as_bytes()))
}

/// Rewrite a verified legacy credential as Argon2id.
///
/// Best effort: failures are logged and the login that triggered the
/// migration is unaffected. The account keeps its legacy digest and is
/// migrated again on the next successful login.
pub async fn migrate(store: &dyn AccountStore, account_id: i64, password: &str) {
    let owned = password.to_string();
    let hashed = match tokio::task::spawn_blocking(move || hash_password(&owned)).await {
        Ok(Ok(hashed)) => hashed,
        Ok(Err(e)) => {
            error!("Failed to hash password during migration for account {account_id}: {e}");
            return;
        }
        Err(e) => {
            error!("Password migration task failed for account {account_id}: {e}");
            return;
        }
    };

    match store
        .update_account(account_id, &AccountUpdate::pass(hashed))
        .await
    {
        Ok(()) => info!("Migrated legacy password for account {account_id} to Argon2id"),
        Err(e) => warn!("Failed to persist migrated password for account {account_id}: {e}"),
    }
}
