//! snorkelctl: Command-line interface for Snorkels stores.
//!
//! Opens a store with the configured adapter, runs one command against it
//! and shuts the store down so queued writes land before the process exits.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use snorkels::observability::tracing::{init_tracing, LogFormat};
use snorkels::StoreConfig;

/// Log filter when RUST_LOG is unset; keeps stdout output readable.
const DEFAULT_LOG_FILTER: &str = "warn";

/// Command-line interface for Snorkels stores.
#[derive(Parser)]
#[command(name = "snorkelctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    store: StoreConfig,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    output: OutputFormat,

    /// Log format on stderr
    #[arg(long, env = "SNORKELS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Store a value under a key
    Set {
        /// Key
        key: String,
        /// Value (or use --file)
        value: Option<String>,
        /// Read value from file
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Print the value stored under a key
    Get {
        /// Key
        key: String,
    },
    /// Remove a key
    Delete {
        /// Key
        key: String,
    },
    /// List all keys
    Keys,
    /// Remove every key
    Clear,
    /// Write all entries to a file
    Dump {
        /// Destination file
        path: String,
    },
    /// Load entries from a file written by `dump`
    Load {
        /// Source file
        path: String,
    },
    /// Show key count and size
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(DEFAULT_LOG_FILTER, cli.log_format).context("failed to initialize tracing")?;

    let store = cli.store.open().context("failed to open store")?;
    tracing::debug!(store = %store, "Store opened");

    let result = match cli.command {
        Commands::Set { key, value, file } => {
            commands::entries::set(&store, &key, value, file, cli.output)
        }
        Commands::Get { key } => commands::entries::get(&store, &key, cli.output),
        Commands::Delete { key } => commands::entries::delete(&store, &key, cli.output),
        Commands::Keys => commands::entries::keys(&store, cli.output),
        Commands::Clear => commands::entries::clear(&store, cli.output),
        Commands::Dump { path } => commands::file::dump(&store, &path, cli.output),
        Commands::Load { path } => commands::file::load(&store, &path, cli.output),
        Commands::Stats => commands::stats::run(&store, cli.output),
    };

    let shutdown = store.shutdown().context("failed to shut down store");
    result?;
    shutdown
}
