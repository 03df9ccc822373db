//! Maps parsed CLI arguments to an [`Action`].

use crate::cli::actions::{reset, server, setup, Action};
use crate::cli::commands::{
    ARG_ALLOWED_HOST, ARG_DSN, ARG_PORT, ARG_SECURITY_PATH, ARG_WEB_CONTEXT, CMD_RESET, CMD_SERVER,
    CMD_SETUP,
};
use anyhow::{anyhow, Context, Result};

fn required(matches: &clap::ArgMatches, id: &str) -> Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .with_context(|| format!("missing required argument: --{id}"))
}

/// # Errors
/// Returns an error if no known subcommand was given or a required argument
/// is missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let (name, sub_m) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("missing subcommand"))?;
    let dsn = required(sub_m, ARG_DSN)?;

    match name {
        CMD_SERVER => Ok(Action::Server(server::Args {
            port: sub_m.get_one::<u16>(ARG_PORT).copied().unwrap_or(8081),
            dsn,
            web_context: sub_m
                .get_one::<String>(ARG_WEB_CONTEXT)
                .cloned()
                .unwrap_or_else(|| "/".to_string()),
        })),
        CMD_SETUP => Ok(Action::Setup(setup::Args {
            dsn,
            allowed_host: required(sub_m, ARG_ALLOWED_HOST)?,
            security_path: required(sub_m, ARG_SECURITY_PATH)?,
        })),
        CMD_RESET => Ok(Action::Reset(reset::Args { dsn })),
        other => Err(anyhow!("unknown subcommand: {other}")),
    }
}
