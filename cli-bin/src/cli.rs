// src/cli.rs
pub mod watch;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Output format for commands.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Format {
    Text,
    Json,
}

/// Sentinel – watch a directory tree and print what changes
#[derive(Parser, Debug)]
#[command(author, version, about, propagate_version = true)]
pub struct Cli {
    /// Enable debug logging and extra output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Output format (text or JSON)
    #[arg(long, default_value = "text", value_enum, global = true)]
    pub format: Format,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a directory recursively and print every change
    Watch(watch::WatchOpts),

    /// Generate shell completions (hidden)
    #[command(hide = true)]
    Completions {
        /// Shell to generate for
        #[arg(value_enum)]
        shell: Shell,
    },
}
