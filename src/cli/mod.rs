//! CLI module for netbox-do-sync.
//!
//! This module provides the command-line flags and output rendering.

mod commands;
mod output;

pub use commands::{Cli, LogFormat, OutputFormat};
pub use output::OutputFormatter;
