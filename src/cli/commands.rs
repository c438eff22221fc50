//! CLI commands and argument parsing

use crate::types::LogLevel;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// HubSpot change-capture connector CLI
#[derive(Parser, Debug)]
#[command(name = "hubspot-connector")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML or JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline config JSON
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// Resource table file (YAML), replaces the built-in HubSpot table
    #[arg(long, global = true)]
    pub registry: Option<PathBuf>,

    /// State file (JSON)
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output (same as `--log-level debug`)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Effective log level
    pub fn log_level(&self) -> LogLevel {
        if self.verbose && self.log_level == LogLevel::Info {
            LogLevel::Debug
        } else {
            self.log_level
        }
    }
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read change records as JSON lines
    Read {
        /// Stop after this many records
        #[arg(long)]
        max_records: Option<usize>,

        /// Stop after this many seconds without a record
        #[arg(long)]
        idle_timeout: Option<u64>,
    },

    /// Apply JSON-line records from stdin
    Write,

    /// List known resources and their capability
    Resources,

    /// Validate and print a position
    Position {
        /// Position JSON
        #[arg(long)]
        decode: String,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
