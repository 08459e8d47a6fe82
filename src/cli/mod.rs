//! CLI command surface (§4.12): a thin `clap` front end over the same
//! library every HTTP handler uses. No subcommand duplicates business
//! logic — each delegates straight to `pipeline`/`jobs`/`storage`.

mod config_cmd;
mod ingest;
mod jobs_cmd;
mod serve;
mod status;

pub use config_cmd::run as run_config;
pub use ingest::run as run_ingest;
pub use jobs_cmd::run as run_jobs;
pub use serve::run as run_serve;
pub use status::run as run_status;

use clap::{Parser, Subcommand};

/// mnemograph: a tiered-retrieval memory service for AI agents.
#[derive(Parser, Debug)]
#[command(name = "mnemograph", version, about)]
pub struct Cli {
    /// Force debug-level logging regardless of the configured log level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Runs the HTTP API server.
    Serve,
    /// Ingests a raw resource and runs extraction over it immediately.
    Ingest {
        /// Raw text content to ingest.
        #[arg(short, long)]
        content: String,
        /// Source tag, e.g. `project:foo`.
        #[arg(short, long, default_value = "cli")]
        source: String,
    },
    /// Runs one maintenance pipeline once, synchronously.
    Jobs {
        #[command(subcommand)]
        which: JobKind,
    },
    /// Prints process and storage health counters.
    Status,
    /// Prints the resolved configuration.
    Config,
}

/// Maintenance pipelines runnable from the CLI (§4.8).
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum JobKind {
    /// Duplicate archival, hotness promotion, category summary refresh.
    Nightly,
    /// Time decay, confidence propagation, stale archival, compression.
    Weekly,
    /// Embedding refresh and full graph rebuild.
    Monthly,
}
