use anyhow::Result;
use clap::Parser;
use intervox::app::{self, Overrides};
use intervox::cli::{Cli, Commands};
use intervox::config::Config;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            let config = load_config(cli.config.as_deref())?;
            let overrides = Overrides {
                device: cli.device,
                model: cli.model,
                workers: cli.workers,
                transcript: cli.transcript,
                no_speech: cli.no_speech,
            };
            app::run_interview(config, &overrides, cli.quiet)?;
        }
        Some(Commands::Devices) => {
            app::run_devices()?;
        }
        Some(Commands::Check) => {
            let config = load_config(cli.config.as_deref())?;
            app::run_check(&config);
        }
    }

    Ok(())
}

/// Load configuration from an explicit path, or the default location with
/// environment overrides applied.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path()),
    };
    Ok(config.with_env_overrides())
}
