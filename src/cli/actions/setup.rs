use crate::store::{ConfigStore, SqliteStore, ALLOWED_HOST, SECURITY_PATH};
use anyhow::{ensure, Context, Result};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Args {
    pub dsn: String,
    pub allowed_host: String,
    pub security_path: String,
}

/// `secure` and `/secure` both become `/secure`.
#[must_use]
pub fn normalize_security_path(path: &str) -> String {
    let path = path.trim();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Write the access policy to `store`.
///
/// # Errors
/// Returns an error if either value is blank or the store rejects the write.
pub async fn apply(store: &dyn ConfigStore, allowed_host: &str, security_path: &str) -> Result<()> {
    let allowed_host = allowed_host.trim();
    ensure!(!allowed_host.is_empty(), "allowed host must not be empty");
    ensure!(
        !security_path.trim().is_empty(),
        "security path must not be empty"
    );
    let security_path = normalize_security_path(security_path);

    store
        .set(ALLOWED_HOST, allowed_host)
        .await
        .with_context(|| format!("Failed to save {ALLOWED_HOST}"))?;
    store
        .set(SECURITY_PATH, &security_path)
        .await
        .with_context(|| format!("Failed to save {SECURITY_PATH}"))?;

    info!("Access policy set: host {allowed_host}, path {security_path}");
    Ok(())
}

/// Handle the setup action
///
/// # Errors
/// Returns an error if the database cannot be opened or the policy is invalid.
pub async fn handle(args: Args) -> Result<()> {
    let store = SqliteStore::connect(&args.dsn)
        .await
        .context("Failed to open database")?;

    apply(&store, &args.allowed_host, &args.security_path).await?;

    let security_path = normalize_security_path(&args.security_path);
    println!(
        "Setup complete. Start the server with `--web-context {security_path}`; the panel is reachable at http://{}{security_path}",
        args.allowed_host.trim(),
    );
    Ok(())
}
