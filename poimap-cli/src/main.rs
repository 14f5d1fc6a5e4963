//! poimap CLI - find public toilets, drinking water and glass recycling
//! near a location.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::nearby::NearbyArgs;
use commands::watch::WatchArgs;
use runner::GlobalOptions;

#[derive(Debug, Parser)]
#[command(name = "poimap", version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.poimap/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for poimap targets; RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search once around a location
    Nearby(NearbyArgs),

    /// Keep results fresh while reading viewport events from stdin
    Watch(WatchArgs),

    /// Inspect or create the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let options = GlobalOptions {
        config: cli.config,
        log_level: cli.log_level,
        log_dir: cli.log_dir,
    };

    let result = match cli.command {
        Commands::Nearby(args) => commands::nearby::run(args, &options),
        Commands::Watch(args) => commands::watch::run(args, &options),
        Commands::Config(command) => commands::config::run(command, &options),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
