//! Sentinel CLI entry-point
//!
//! All watching happens in the `libsentinel` crate; this file handles
//! argument parsing, logging and dispatch.

mod cli; // sub-command definitions and argument structs

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use libsentinel::logging;
use std::{env, io};

use cli::{Cli, Commands};

fn main() -> Result<()> {
    /* ── CLI parsing & logging ────────────────────────────────── */
    let args = Cli::parse();
    if args.verbose {
        env::set_var("RUST_LOG", "debug");
    }
    logging::init();

    /* ── command dispatch ────────────────────────────────────── */
    match args.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "sentinel", &mut io::stdout());
        }
        Commands::Watch(opts) => cli::watch::run(&opts, args.format)?,
    }

    Ok(())
}
