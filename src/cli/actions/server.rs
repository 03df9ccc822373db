use crate::panelgate::new;
use crate::store::SqliteStore;
use anyhow::{Context, Result};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub web_context: String,
}

/// Handle the server action
///
/// # Errors
/// Returns an error if the database cannot be opened or the server fails.
pub async fn handle(args: Args) -> Result<()> {
    let store = SqliteStore::connect(&args.dsn)
        .await
        .context("Failed to open database")?;

    new(args.port, Arc::new(store), &args.web_context).await
}
