use crate::auth::password::hash_password;
use crate::store::{AccountStore, AccountUpdate, SqliteStore};
use anyhow::{Context, Result};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use tracing::info;

/// Account seeded as the default admin.
pub const ADMIN_ACCOUNT_ID: i64 = 1;

const RANDOM_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct Args {
    pub dsn: String,
}

fn random_string(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Give the default admin a fresh random username and password.
///
/// Both fields are written in one update so a failed write leaves the
/// previous credentials in place. Returns the new `(username, password)` pair.
///
/// # Errors
/// Returns an error if hashing fails or the account does not exist or
/// cannot be updated.
pub async fn reset_admin(accounts: &dyn AccountStore) -> Result<(String, String)> {
    let username = random_string(RANDOM_LEN);
    let password = random_string(RANDOM_LEN);

    let owned = password.clone();
    let hashed = tokio::task::spawn_blocking(move || hash_password(&owned))
        .await
        .context("Password hashing task failed")?
        .context("Failed to hash admin password")?;

    accounts
        .update_account(
            ADMIN_ACCOUNT_ID,
            &AccountUpdate {
                username: Some(username.clone()),
                pass: Some(hashed),
                ..AccountUpdate::default()
            },
        )
        .await
        .context("Failed to reset admin credentials")?;

    info!("Reset credentials of account {ADMIN_ACCOUNT_ID}");
    Ok((username, password))
}

/// Handle the reset action
///
/// # Errors
/// Returns an error if the database cannot be opened or the reset fails.
pub async fn handle(args: Args) -> Result<()> {
    let store = SqliteStore::connect(&args.dsn)
        .await
        .context("Failed to open database")?;

    let (username, password) = reset_admin(&store).await?;

    println!("Username: {username}");
    println!("Password: {password}");
    Ok(())
}
