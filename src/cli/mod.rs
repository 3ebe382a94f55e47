//! CLI module
//!
//! Command-line interface for running connectors.
//!
//! # Commands
//!
//! - `check` - Test connection to the API
//! - `discover` - List available streams
//! - `read` - Extract data from streams
//! - `validate` - Validate a connector definition

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;

#[cfg(test)]
mod tests;
