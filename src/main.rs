//! Binary entry point for mnemograph.
//!
//! A thin `clap` dispatcher over the shared library: every subcommand
//! calls straight into `mnemograph::{pipeline, jobs, api}` rather than
//! reimplementing any business logic here.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![allow(clippy::print_stderr)]

use clap::Parser;
use mnemograph::cli::{self, Cli, Command};
use mnemograph::config::Settings;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> mnemograph::Result<()> {
    let mut settings = Settings::from_env()?;
    if cli.verbose {
        settings.debug = true;
    }
    mnemograph::observability::init(&settings)?;

    match cli.command {
        Command::Serve => cli::run_serve(settings).await,
        Command::Ingest { content, source } => cli::run_ingest(&settings, &content, &source),
        Command::Jobs { which } => cli::run_jobs(&settings, which),
        Command::Status => cli::run_status(&settings),
        Command::Config => {
            cli::run_config(&settings);
            Ok(())
        },
    }
}
