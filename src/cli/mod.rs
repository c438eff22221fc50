//! CLI module
//!
//! Command-line host for the connector.
//!
//! # Commands
//!
//! - `read` - Print change records as JSON lines, checkpointing positions
//! - `write` - Apply JSON-line records from stdin
//! - `resources` - List known resources and their capability
//! - `position` - Validate and print a position

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
