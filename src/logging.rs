//! Tracing subscriber setup
//!
//! Logs go to stderr so forecast tables and JSON on stdout stay clean.
//! `RUST_LOG` takes precedence over the configured level.

use std::io;

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Filter directives for this crate at `level`, dependencies at `warn`
#[must_use]
pub fn directives(config: &LoggingConfig, verbose: bool) -> String {
    let level = if verbose { "debug" } else { config.level.as_str() };
    format!("warn,skycast={level}")
}

/// Install the global subscriber
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives(config, verbose)))
        .with_context(|| format!("Invalid log level '{}'", config.level))?;

    let (pretty, json) = if config.format == "json" {
        (None, Some(fmt::layer().json().with_writer(io::stderr)))
    } else {
        (Some(fmt::layer().with_target(false).with_writer(io::stderr)), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .try_init()
        .with_context(|| "Failed to install tracing subscriber")?;
    Ok(())
}
