//! cleannet CLI
//!
//! Command-line interface for the DNS interception engine.

mod args;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use tracing::error;

use args::{Args, Command};

fn main() -> Result<()> {
    let args = Args::parse();

    logging::init(&args)?;

    let result = run(args);

    if let Err(ref e) = result {
        error!("Fatal error: {:#}", e);
    }

    result
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Run(run_args) => commands::run::execute(run_args),
        Command::Check(check_args) => commands::check::execute(check_args),
    }
}
