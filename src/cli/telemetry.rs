use anyhow::{anyhow, Result};
use std::str::FromStr;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(anyhow!("unknown log format: {other}")),
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `verbosity_level` (or ERROR) is
/// the default directive.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init(verbosity_level: Option<tracing::Level>, format: LogFormat) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false);

    // RUST_LOG=
    let env_filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.unwrap_or(tracing::Level::ERROR).into())
        .from_env_lossy();

    let registry = Registry::default().with(env_filter);

    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt_layer))?,
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt_layer.json()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_format() -> Result<()> {
        assert_eq!("text".parse::<LogFormat>()?, LogFormat::Text);
        assert_eq!("JSON".parse::<LogFormat>()?, LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
        Ok(())
    }
}
