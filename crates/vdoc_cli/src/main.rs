//! vdoc CLI - Command-line interface for vdoc document stores.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "vdoc")]
#[command(about = "Versioned document store", long_about = None)]
#[command(version)]
struct Cli {
    /// Store root directory
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new store
    Init {
        /// Revision-control backend (lite, rcs)
        #[arg(long, default_value = "lite")]
        backend: String,
    },
    /// Print a topic or attachment
    Cat {
        /// Namespace (dotted or slashed)
        namespace: String,
        /// Topic name
        topic: String,
        /// Attachment name
        #[arg(short, long)]
        attachment: Option<String>,
        /// Revision to print (latest if omitted)
        #[arg(short, long)]
        rev: Option<u32>,
        /// Print the stored form, metadata included
        #[arg(long)]
        raw: bool,
    },
    /// Show the revision history of a topic or attachment
    History {
        /// Namespace (dotted or slashed)
        namespace: String,
        /// Topic name
        topic: String,
        /// Attachment name
        #[arg(short, long)]
        attachment: Option<String>,
        /// Maximum number of revisions to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Save a topic or attachment from a file or stdin
    Save {
        /// Namespace (dotted or slashed)
        namespace: String,
        /// Topic name
        topic: String,
        /// Attachment name
        #[arg(short, long)]
        attachment: Option<String>,
        /// Read content from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Author to record (defaults to $USER)
        #[arg(long)]
        author: Option<String>,
        /// Check-in comment
        #[arg(short, long, default_value = "")]
        message: String,
        /// Always create a new revision
        #[arg(long)]
        force_new_revision: bool,
        /// Mark the change as minor
        #[arg(long)]
        minor: bool,
    },
    /// Report (and optionally delete) redundant history files
    Reclaim {
        /// Only scan this namespace
        #[arg(long)]
        namespace: Option<String>,
        /// Delete redundant history files
        #[arg(long)]
        delete: bool,
    },
}

fn log_filter(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    // Respects RUST_LOG environment variable (e.g., RUST_LOG=vdoc_core=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_filter(cli.verbose, cli.quiet))),
        )
        .with_writer(std::io::stderr)
        .init();

    let root = cli.root.as_path();
    match cli.command {
        Commands::Init { backend } => commands::init::run(root, &backend),
        Commands::Cat {
            namespace,
            topic,
            attachment,
            rev,
            raw,
        } => commands::cat::run(root, &namespace, &topic, attachment.as_deref(), rev, raw),
        Commands::History {
            namespace,
            topic,
            attachment,
            limit,
        } => commands::history::run(root, &namespace, &topic, attachment.as_deref(), limit),
        Commands::Save {
            namespace,
            topic,
            attachment,
            file,
            author,
            message,
            force_new_revision,
            minor,
        } => commands::save::run(
            root,
            &commands::save::SaveArgs {
                namespace,
                topic,
                attachment,
                file,
                author,
                message,
                force_new_revision,
                minor,
            },
        ),
        Commands::Reclaim { namespace, delete } => commands::reclaim::run(root, namespace, delete, cli.quiet),
    }
}
