//! Credential verification, legacy migration and session tokens.

pub mod error;
pub mod legacy;
pub mod password;
pub mod token;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, error};

pub use error::AuthError;

use crate::store::{
    AccountFilter, AccountIdentity, AccountStore, AccountUpdate, ConfigStore, JWT_SECRET,
};
use legacy::{classify, verify_legacy, CredentialScheme};
use password::{hash_password, verify_password};
use token::{sign_hs256, verify_hmac, SessionClaims};

#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    config: Arc<dyn ConfigStore>,
}

impl AuthService {
    #[must_use]
    pub fn new(accounts: Arc<dyn AccountStore>, config: Arc<dyn ConfigStore>) -> Self {
        Self { accounts, config }
    }

    /// Authenticate an admin and mint a session token.
    ///
    /// Every failure tied to the submitted credentials (unknown user, wrong
    /// password, unreadable stored hash) is reported as
    /// [`AuthError::Authentication`]. A legacy credential that verifies is
    /// rewritten as Argon2id before the token is issued.
    ///
    /// # Errors
    /// Returns [`AuthError::Authentication`] on any credential mismatch, or a
    /// store/configuration error if the account or secret cannot be read.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let Some(record) = self
            .accounts
            .find_account(&AccountFilter::active_admin(username))
            .await?
        else {
            // burn the same KDF cost as a real account
            verify_argon2(password, DECOY_CREDENTIAL, None).await;
            return Err(AuthError::Authentication);
        };
        let id = record.identity.id;

        let Some(stored) = record.pass.as_deref().filter(|pass| !pass.is_empty()) else {
            debug!("Account {id} has no stored credential");
            verify_argon2(password, DECOY_CREDENTIAL, None).await;
            return Err(AuthError::Authentication);
        };

        let matched = match classify(stored) {
            CredentialScheme::Argon2id => verify_argon2(password, stored, Some(id)).await,
            CredentialScheme::LegacySha224 => {
                let matched = verify_legacy(password, stored);
                if matched {
                    legacy::migrate(self.accounts.as_ref(), id, password).await;
                }
                matched
            }
            CredentialScheme::Unknown => {
                error!("Unrecognized credential format for account {id}");
                false
            }
        };

        if !matched {
            return Err(AuthError::Authentication);
        }

        self.gen_token(record.identity).await
    }

    /// # Errors
    /// Returns [`AuthError::Configuration`] if the signing secret is unavailable.
    pub async fn gen_token(&self, identity: AccountIdentity) -> Result<String, AuthError> {
        self.gen_token_at(identity, chrono::Utc::now().timestamp())
            .await
    }

    /// Issue a token as if the current time were `now_unix_seconds`.
    ///
    /// # Errors
    /// Returns [`AuthError::Configuration`] if the signing secret is unavailable.
    pub async fn gen_token_at(
        &self,
        identity: AccountIdentity,
        now_unix_seconds: i64,
    ) -> Result<String, AuthError> {
        let secret = self.signing_secret().await?;
        let claims = SessionClaims::new(identity, now_unix_seconds);
        sign_hs256(secret.expose_secret().as_bytes(), &claims)
            .map_err(|e| AuthError::Configuration(format!("failed to sign session token: {e}")))
    }

    /// # Errors
    /// See [`AuthService::parse_token_at`].
    pub async fn parse_token(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.parse_token_at(token, chrono::Utc::now().timestamp())
            .await
    }

    /// Validate `token` as of `now_unix_seconds`.
    ///
    /// # Errors
    /// - [`AuthError::Unauthenticated`] for an empty token
    /// - [`AuthError::Configuration`] if the signing secret is unavailable
    /// - [`AuthError::TokenExpired`] once `exp` has passed
    /// - [`AuthError::IllegalToken`] for every other verification failure
    pub async fn parse_token_at(
        &self,
        token: &str,
        now_unix_seconds: i64,
    ) -> Result<SessionClaims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::Unauthenticated);
        }
        let secret = self.signing_secret().await?;
        verify_hmac(token, secret.expose_secret().as_bytes(), now_unix_seconds).map_err(|e| {
            debug!("Rejected session token: {e}");
            AuthError::from(e)
        })
    }

    /// Identity behind a valid session token.
    ///
    /// # Errors
    /// Any [`AuthService::parse_token`] error, or [`AuthError::AccountDisabled`]
    /// if the token was issued to a deleted account.
    pub async fn account_info(&self, token: &str) -> Result<AccountIdentity, AuthError> {
        let claims = self.parse_token(token).await?;
        if claims.account.deleted {
            return Err(AuthError::AccountDisabled);
        }
        Ok(claims.account)
    }

    /// Replace the credential of account `id` with an Argon2id hash of `password`.
    ///
    /// # Errors
    /// Returns an error if hashing fails or the account cannot be updated.
    pub async fn set_password(&self, id: i64, password: &str) -> Result<(), AuthError> {
        let owned = password.to_string();
        let hashed = tokio::task::spawn_blocking(move || hash_password(&owned))
            .await
            .map_err(|e| AuthError::Configuration(format!("hashing task failed: {e}")))??;
        self.accounts
            .update_account(id, &AccountUpdate::pass(hashed))
            .await?;
        Ok(())
    }

    async fn signing_secret(&self) -> Result<SecretString, AuthError> {
        let value = self.config.get(JWT_SECRET).await.map_err(|e| {
            error!("Failed to read {JWT_SECRET}: {e}");
            AuthError::Configuration(format!("{JWT_SECRET} unavailable"))
        })?;
        match value {
            Some(secret) if !secret.is_empty() => Ok(SecretString::from(secret)),
            _ => Err(AuthError::Configuration(format!("{JWT_SECRET} is not set"))),
        }
    }
}

/// Well-formed credential no password derives to; verified against when
/// there is no real credential so lookups cost the same.
const DECOY_CREDENTIAL: &str =
    "$argon2id$5f0c1e7a9b3d42c68e1fa07b2c95d34e$9a4e1c7f03b85d26e1f4a0c79b3d5e82f6a1c04b97e3d58a2c6f10b4e7d93a5c";

/// Argon2id check on the blocking pool; any failure counts as a mismatch.
async fn verify_argon2(password: &str, stored: &str, account: Option<i64>) -> bool {
    let (candidate, stored) = (password.to_string(), stored.to_string());
    match tokio::task::spawn_blocking(move || verify_password(&candidate, &stored)).await {
        Ok(Ok(matched)) => matched,
        Ok(Err(e)) => {
            error!("Failed to verify stored credential for account {account:?}: {e}");
            false
        }
        Err(e) => {
            error!("Password verification task failed for account {account:?}: {e}");
            false
        }
    }
}

/// Token from an `Authorization: Bearer <token>` header, if present.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::legacy::legacy_digest;
    use crate::auth::password::ARGON2ID_PREFIX;
    use crate::auth::token::TOKEN_TTL_SECONDS;
    use crate::store::{AccountRecord, MemoryStore, StoreError};
    use axum::http::HeaderValue;

    const PASSWORD: &str = "testpassword";

    async fn service_with(pass: Option<String>) -> Result<(AuthService, Arc<MemoryStore>), StoreError> {
        let store = Arc::new(MemoryStore::new());
        store.set(JWT_SECRET, "a1b2c3d4e5f60718").await?;
        store
            .insert_account(AccountRecord {
                identity: AccountIdentity {
                    id: 1,
                    username: "sysadmin".to_string(),
                    role: "admin".to_string(),
                    deleted: false,
                },
                pass,
            })
            .await;
        let service = AuthService::new(store.clone(), store.clone());
        Ok((service, store))
    }

    #[tokio::test]
    async fn legacy_login_migrates_exactly_once() -> Result<(), Box<dyn std::error::Error>> {
        let (service, store) = service_with(Some(legacy_digest(PASSWORD))).await?;

        let token = service.login("sysadmin", PASSWORD).await?;
        assert!(!token.is_empty());
        assert_eq!(store.account_writes(), 1);

        let pass = store.account(1).await.and_then(|r| r.pass).unwrap_or_default();
        assert!(pass.starts_with(ARGON2ID_PREFIX));
        assert!(verify_password(PASSWORD, &pass)?);

        service.login("sysadmin", PASSWORD).await?;
        assert_eq!(store.account_writes(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn failed_migration_still_logs_in() -> Result<(), Box<dyn std::error::Error>> {
        let (service, store) = service_with(Some(legacy_digest(PASSWORD))).await?;
        store.fail_writes(true);

        service.login("sysadmin", PASSWORD).await?;
        let pass = store.account(1).await.and_then(|r| r.pass);
        assert_eq!(pass, Some(legacy_digest(PASSWORD)));
        Ok(())
    }

    #[tokio::test]
    async fn credential_failures_are_indistinguishable() -> Result<(), Box<dyn std::error::Error>> {
        let (service, store) = service_with(Some(hash_password(PASSWORD)?)).await?;

        let wrong = service.login("sysadmin", "wrongpassword").await;
        assert!(matches!(wrong, Err(AuthError::Authentication)));

        let unknown = service.login("nobody", PASSWORD).await;
        assert!(matches!(unknown, Err(AuthError::Authentication)));

        store
            .update_account(1, &AccountUpdate::pass("$argon2id$zz$zz"))
            .await?;
        let malformed = service.login("sysadmin", PASSWORD).await;
        assert!(matches!(malformed, Err(AuthError::Authentication)));

        store
            .update_account(1, &AccountUpdate::pass("plain-text"))
            .await?;
        let unknown_scheme = service.login("sysadmin", "plain-text").await;
        assert!(matches!(unknown_scheme, Err(AuthError::Authentication)));
        Ok(())
    }

    #[tokio::test]
    async fn empty_credential_rejected() -> Result<(), StoreError> {
        let (service, _) = service_with(None).await?;
        let result = service.login("sysadmin", PASSWORD).await;
        assert!(matches!(result, Err(AuthError::Authentication)));
        Ok(())
    }

    #[tokio::test]
    async fn deleted_admin_cannot_log_in() -> Result<(), Box<dyn std::error::Error>> {
        let (service, store) = service_with(Some(hash_password(PASSWORD)?)).await?;
        let disable = AccountUpdate {
            deleted: Some(true),
            ..AccountUpdate::default()
        };
        store.update_account(1, &disable).await?;

        let result = service.login("sysadmin", PASSWORD).await;
        assert!(matches!(result, Err(AuthError::Authentication)));
        Ok(())
    }

    #[tokio::test]
    async fn token_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
        let (service, _) = service_with(None).await?;
        let identity = AccountIdentity {
            id: 1,
            username: "sysadmin".to_string(),
            role: "admin".to_string(),
            deleted: false,
        };
        let now = 1_700_000_000;

        let token = service.gen_token_at(identity.clone(), now).await?;
        let claims = service.parse_token_at(&token, now + 1).await?;
        assert_eq!(claims.account, identity);

        let expired = service
            .parse_token_at(&token, now + TOKEN_TTL_SECONDS + 1)
            .await;
        assert!(matches!(expired, Err(AuthError::TokenExpired)));

        let empty = service.parse_token_at("", now).await;
        assert!(matches!(empty, Err(AuthError::Unauthenticated)));

        let garbage = service.parse_token_at("not-a-token", now).await;
        assert!(matches!(garbage, Err(AuthError::IllegalToken)));
        Ok(())
    }

    #[tokio::test]
    async fn token_from_other_secret_is_illegal() -> Result<(), Box<dyn std::error::Error>> {
        let (service, store) = service_with(None).await?;
        let identity = AccountIdentity {
            id: 1,
            username: "sysadmin".to_string(),
            role: "admin".to_string(),
            deleted: false,
        };
        let token = service.gen_token(identity).await?;

        store.set(JWT_SECRET, "rotated-secret").await?;
        let result = service.parse_token(&token).await;
        assert!(matches!(result, Err(AuthError::IllegalToken)));
        Ok(())
    }

    #[tokio::test]
    async fn missing_secret_is_configuration_error() -> Result<(), Box<dyn std::error::Error>> {
        let (service, store) = service_with(Some(hash_password(PASSWORD)?)).await?;
        store.set(JWT_SECRET, "").await?;

        let login = service.login("sysadmin", PASSWORD).await;
        assert!(matches!(login, Err(AuthError::Configuration(_))));

        let parse = service.parse_token("a.b.c").await;
        assert!(matches!(parse, Err(AuthError::Configuration(_))));
        Ok(())
    }

    #[tokio::test]
    async fn account_info_rejects_disabled_identity() -> Result<(), Box<dyn std::error::Error>> {
        let (service, _) = service_with(None).await?;
        let identity = AccountIdentity {
            id: 1,
            username: "sysadmin".to_string(),
            role: "admin".to_string(),
            deleted: true,
        };
        let token = service.gen_token(identity).await?;

        let result = service.account_info(&token).await;
        assert!(matches!(result, Err(AuthError::AccountDisabled)));
        Ok(())
    }

    #[tokio::test]
    async fn set_password_writes_current_scheme() -> Result<(), Box<dyn std::error::Error>> {
        let (service, store) = service_with(Some(legacy_digest(PASSWORD))).await?;

        service.set_password(1, "n3w-Passw0rd").await?;
        let pass = store.account(1).await.and_then(|r| r.pass).unwrap_or_default();
        assert!(verify_password("n3w-Passw0rd", &pass)?);

        let missing = service.set_password(99, "whatever").await;
        assert!(matches!(missing, Err(AuthError::Store(StoreError::NotFound(99)))));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_user_pays_full_verification() -> Result<(), Box<dyn std::error::Error>> {
        let decoy: password::Credential = DECOY_CREDENTIAL.parse()?;
        assert!(!decoy.verify(PASSWORD)?);
        assert!(!verify_argon2(PASSWORD, DECOY_CREDENTIAL, None).await);

        let (service, store) = service_with(Some(hash_password(PASSWORD)?)).await?;
        let unknown = service.login("nobody", PASSWORD).await;
        assert!(matches!(unknown, Err(AuthError::Authentication)));
        assert_eq!(store.account_writes(), 0);
        Ok(())
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }
}
