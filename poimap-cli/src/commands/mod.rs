//! CLI subcommands.

pub mod common;
pub mod config;
pub mod nearby;
pub mod watch;
