//! Outpost CLI
//!
//! Command-line tools for inspecting, maintaining and syncing an Outpost
//! store.
//!
//! # Commands
//!
//! - `inspect` - Display store statistics
//! - `queue` - List pending actions
//! - `enqueue` - Record an action
//! - `dataset` - Print a reference dataset
//! - `verify` - Check journal and snapshot integrity
//! - `compact` - Checkpoint the store and truncate the journal
//! - `dump-journal` - Dump journal frames for debugging
//! - `sync` - Run one sync cycle against an HTTP backend

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Outpost offline store and sync tools.
#[derive(Parser)]
#[command(name = "outpost")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List actions waiting for confirmation
    Queue {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Record an action in the queue
    Enqueue {
        /// Action kind, e.g. `sale`
        #[arg(short, long)]
        kind: String,

        /// Action payload as JSON
        #[arg(long, default_value = "{}")]
        payload: String,
    },

    /// Print the records of a reference dataset
    Dataset {
        /// Dataset name
        name: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify journal and snapshot integrity
    Verify,

    /// Checkpoint the store and truncate the journal
    Compact {
        /// Show what would be done without writing
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Dump journal frames for debugging
    DumpJournal {
        /// Maximum number of frames to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run one sync cycle against an HTTP backend
    Sync {
        /// Backend base URL
        #[arg(short, long)]
        url: String,

        /// Dataset to pull (repeatable)
        #[arg(short, long = "dataset")]
        datasets: Vec<String>,

        /// Per-request timeout in seconds
        #[arg(long, default_value = "30")]
        timeout_secs: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Queue { format } => {
            let path = cli.path.ok_or("Store path required for queue")?;
            commands::queue::list(&path, &format)?;
        }
        Commands::Enqueue { kind, payload } => {
            let path = cli.path.ok_or("Store path required for enqueue")?;
            commands::queue::enqueue(&path, &kind, &payload)?;
        }
        Commands::Dataset { name, format } => {
            let path = cli.path.ok_or("Store path required for dataset")?;
            commands::dataset::run(&path, &name, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Store path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Compact { dry_run } => {
            let path = cli.path.ok_or("Store path required for compact")?;
            commands::compact::run(&path, dry_run)?;
        }
        Commands::DumpJournal { limit, format } => {
            let path = cli.path.ok_or("Store path required for dump-journal")?;
            commands::dump_journal::run(&path, limit, &format)?;
        }
        Commands::Sync {
            url,
            datasets,
            timeout_secs,
            format,
        } => {
            let path = cli.path.ok_or("Store path required for sync")?;
            commands::sync::run(&path, &url, &datasets, timeout_secs, &format)?;
        }
        Commands::Version => {
            println!("Outpost CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
