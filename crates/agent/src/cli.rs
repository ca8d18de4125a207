pub mod config_cmd;
pub mod simulate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use sl_domain::config::Config;
use sl_domain::error::{Error, Result};

/// ServiceLine: the conversation core of a home-services voice agent.
#[derive(Debug, Parser)]
#[command(name = "serviceline", version, about)]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Drive a simulated call from the terminal through the real
    /// processor (default when no subcommand is given).
    Simulate {
        /// Caller phone number handed to the pipeline.
        #[arg(long, default_value = "+15125551234")]
        phone: String,
        /// Skip webhook delivery at the end of the call.
        #[arg(long)]
        no_webhooks: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Validate the configuration and report every issue found.
    Validate,
    /// Print the effective configuration as TOML.
    Show,
}

/// Load the config file, or fall back to defaults when none exists.
///
/// Resolution order: `--config`, `$SL_CONFIG`, `./serviceline.toml`.
pub fn load_config(explicit: Option<&PathBuf>) -> Result<(Config, PathBuf)> {
    let path = explicit
        .cloned()
        .or_else(|| std::env::var("SL_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("serviceline.toml"));

    if !path.exists() {
        tracing::warn!(path = %path.display(), "config file not found; using defaults");
        return Ok((Config::default(), path));
    }

    let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
    let config: Config = toml::from_str(&raw)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
    Ok((config, path))
}
