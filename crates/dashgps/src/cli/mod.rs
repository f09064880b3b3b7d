//! Command-line interface for dashgps.
//!
//! This module provides the CLI structure for the `dashgps` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    ConfigCommand, ExportCommand, IngestCommand, InspectCommand, ListCommand, OutputFormat,
    StatusCommand,
};

/// dashgps - Extract GPS telemetry from dashcam recordings
///
/// Finds the obfuscated GPS and accelerometer samples some dashcams embed in
/// their video files, decodes them, and keeps them in a local database.
#[derive(Debug, Parser)]
#[command(name = "dashgps")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the database (overrides config)
    #[arg(long, global = true, value_name = "FILE")]
    pub database: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract and store telemetry from dashcam files
    Ingest(IngestCommand),

    /// Print the telemetry of one file without storing it
    Inspect(InspectCommand),

    /// Print the stored telemetry of a processed file
    Export(ExportCommand),

    /// List processed files
    List(ListCommand),

    /// Show database statistics
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}
