use clap::Parser;
use tracing_subscriber::EnvFilter;

use sl_domain::config::ConfigSeverity;

mod cli;

use cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Default to simulate when no subcommand is given.
    let command = cli.command.unwrap_or(Command::Simulate {
        phone: "+15125551234".to_owned(),
        no_webhooks: false,
    });

    match command {
        Command::Simulate { phone, no_webhooks } => {
            init_tracing();
            let (config, _path) = cli::load_config(cli.config.as_ref())?;

            // Surface config issues up front; errors abort, warnings
            // (e.g. a non-production webhook receiver) just log.
            let issues = config.validate();
            for issue in &issues {
                match issue.severity {
                    ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
                    ConfigSeverity::Error => tracing::error!("config: {issue}"),
                }
            }
            if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
                anyhow::bail!(
                    "config validation failed with {} error(s)",
                    issues
                        .iter()
                        .filter(|i| i.severity == ConfigSeverity::Error)
                        .count()
                );
            }

            cli::simulate::simulate(config, phone, no_webhooks).await
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, path) = cli::load_config(cli.config.as_ref())?;
            if !cli::config_cmd::validate(&config, &path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _path) = cli::load_config(cli.config.as_ref())?;
            cli::config_cmd::show(&config);
            Ok(())
        }
        Command::Version => {
            println!("serviceline {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Structured JSON tracing for the simulate command.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sl_pipeline=debug")),
        )
        .json()
        .init();
}
