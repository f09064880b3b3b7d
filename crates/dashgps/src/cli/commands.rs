//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

/// Ingest command arguments.
#[derive(Debug, Args)]
pub struct IngestCommand {
    /// Dashcam files to process
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Divisor for raw accelerometer values (overrides config)
    #[arg(long, value_name = "SCALE")]
    pub accel_scale: Option<f64>,

    /// Number of files walked concurrently (overrides config)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

/// Inspect command arguments.
#[derive(Debug, Args)]
pub struct InspectCommand {
    /// Dashcam file to read
    pub file: PathBuf,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,

    /// Divisor for raw accelerometer values (overrides config)
    #[arg(long, value_name = "SCALE")]
    pub accel_scale: Option<f64>,
}

/// Export command arguments.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Name of a processed file, as shown by `list`
    pub name: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// SQL LIKE pattern on file names (e.g. "2023_04%")
    #[arg(default_value = "%")]
    pub pattern: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(
            OutputFormat::from_str("json", true).unwrap(),
            OutputFormat::Json
        );
        assert!(OutputFormat::from_str("table", true).is_err());
    }

    #[test]
    fn test_ingest_command_debug() {
        let cmd = IngestCommand {
            files: vec![PathBuf::from("FILE0001.MP4")],
            accel_scale: Some(100.0),
            jobs: None,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("FILE0001.MP4"));
        assert!(debug_str.contains("accel_scale"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
