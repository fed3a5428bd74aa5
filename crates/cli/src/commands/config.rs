//! Config Commands

use std::path::Path;

use anyhow::{bail, Result};
use clap::Subcommand;
use stepwise_common::EngineConfig;

use crate::output::{print_serialized, print_success, OutputFormat};

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration (file plus environment overrides)
    Show,

    /// Write a configuration file populated with defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

const REDACTED: &str = "********";

/// Configuration as printed: secrets masked
fn redacted(mut config: EngineConfig) -> EngineConfig {
    if !config.authentication.password.is_empty() {
        config.authentication.password = REDACTED.to_string();
    }
    config
}

pub fn execute(cmd: ConfigCommands, path: &Path, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let config = redacted(EngineConfig::load(path)?.apply_env()?);
            match format {
                OutputFormat::Table => println!("{}", toml::to_string_pretty(&config)?),
                _ => print_serialized(&config, format),
            }
        }
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            EngineConfig::default().save(path)?;
            print_success(&format!("Wrote default configuration to {}", path.display()));
        }
    }
    Ok(())
}
