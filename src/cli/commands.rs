//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Relay Connector Development Kit CLI
#[derive(Parser, Debug)]
#[command(name = "relay-cdk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Connector definition file (YAML)
    #[arg(short, long, global = true)]
    pub connector: Option<PathBuf>,

    /// Configuration file (JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline config JSON
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// State file (JSON)
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Inline state JSON
    #[arg(long, global = true)]
    pub state_json: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Test connection to the API
    Check,

    /// Discover available streams
    Discover,

    /// Read data from streams
    Read {
        /// Configured catalog file (JSON); defaults to every discovered stream
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Streams to sync (comma-separated, empty = all)
        #[arg(long, value_delimiter = ',')]
        streams: Vec<String>,

        /// Records between intermediate checkpoints (0 = only final state)
        #[arg(long, default_value = "100")]
        checkpoint_interval: u64,
    },

    /// Validate connector definition
    Validate,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
