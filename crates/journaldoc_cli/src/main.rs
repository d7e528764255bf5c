//! journaldoc CLI
//!
//! Command-line tools for inspecting and repairing journaled documents.
//!
//! # Commands
//!
//! - `inspect` - Show which document files exist and what they hold
//! - `recover` - Run crash recovery and print the document
//! - `dump-journal` - List journal commands for debugging
//! - `apply` - Apply one command to a stored document

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// journaldoc command-line document tools.
#[derive(Parser)]
#[command(name = "journaldoc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base path of the document (files are <path>.snapshot, <path>.journal, ...)
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
    /// Show document files, journal headers and document shape
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Recover the document and print it as JSON
    Recover {
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Dump journal commands for debugging
    DumpJournal {
        /// Read the crash-time journal instead of the runtime journal
        #[arg(long)]
        crashtime: bool,

        /// Maximum number of commands to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Apply one command to the stored document and snapshot it
    Apply {
        /// Document path of the command (e.g. `user.tags.`)
        command_path: String,

        /// JSON value to apply (`null` deletes)
        value: String,

        /// Journal type (defaults to the type found on disk)
        #[arg(long)]
        journal_type: Option<String>,

        /// Journal version (defaults to the version found on disk)
        #[arg(long)]
        journal_version: Option<u64>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Document path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Recover { pretty } => {
            let path = cli.path.ok_or("Document path required for recover")?;
            commands::recover::run(&path, pretty)?;
        }
        Commands::DumpJournal {
            crashtime,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Document path required for dump-journal")?;
            commands::dump_journal::run(&path, crashtime, limit, &format)?;
        }
        Commands::Apply {
            command_path,
            value,
            journal_type,
            journal_version,
        } => {
            let path = cli.path.ok_or("Document path required for apply")?;
            commands::apply::run(
                &path,
                &command_path,
                &value,
                journal_type,
                journal_version,
            )?;
        }
        Commands::Version => {
            println!("journaldoc CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("journaldoc Core v{}", journaldoc_core::VERSION);
        }
    }

    Ok(())
}
