//! Configuration CLI commands.
//!
//! Provides `config path`, `config show` and `config init`.

use clap::Subcommand;

use poimap::config::EngineConfig;

use crate::error::CliError;
use crate::runner::{CliRunner, GlobalOptions};

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration as INI
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, options: &GlobalOptions) -> Result<(), CliError> {
    let runner = CliRunner::new(options)?;

    match command {
        ConfigCommands::Path => {
            let path = runner.config_path();
            let state = if path.exists() { "" } else { " (not created yet)" };
            println!("{}{}", path.display(), state);
            Ok(())
        }
        ConfigCommands::Show => {
            print!("{}", runner.config().to_ini_string());
            Ok(())
        }
        ConfigCommands::Init { force } => {
            let path = runner.config_path();
            if path.exists() && !force {
                return Err(CliError::Config(format!(
                    "{} already exists. Use --force to overwrite.",
                    path.display()
                )));
            }
            EngineConfig::default().save_to(path)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}
