//! `dashgps` - CLI for dashcam GPS extraction
//!
//! This binary provides the command-line interface for extracting telemetry
//! from dashcam files and browsing what has been stored.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use dashgps::cli::{
    Cli, Command, ConfigCommand, ExportCommand, IngestCommand, InspectCommand, ListCommand,
    OutputFormat,
};
use dashgps::ingest::{self, FileOutcome, IngestSettings};
use dashgps::record::{self, TelemetryRecord};
use dashgps::walker::extract_file;
use dashgps::{init_logging, Config, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let mut config =
        Config::load_from(cli.config.clone()).context("failed to load configuration")?;
    if let Some(database) = cli.database {
        config.storage.database_path = Some(database);
    }

    // Execute the command
    match cli.command {
        Command::Ingest(cmd) => handle_ingest(config, cmd).await,
        Command::Inspect(cmd) => handle_inspect(config, &cmd).map(|()| ExitCode::SUCCESS),
        Command::Export(cmd) => handle_export(&config, &cmd).map(|()| ExitCode::SUCCESS),
        Command::List(cmd) => handle_list(&config, &cmd).map(|()| ExitCode::SUCCESS),
        Command::Status(cmd) => handle_status(&config, cmd.json).map(|()| ExitCode::SUCCESS),
        Command::Config(cmd) => handle_config(&config, cmd).map(|()| ExitCode::SUCCESS),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("failed to open database {}", path.display()))
}

async fn handle_ingest(mut config: Config, cmd: IngestCommand) -> anyhow::Result<ExitCode> {
    if let Some(scale) = cmd.accel_scale {
        config.decoder.accel_scale = scale;
    }
    if let Some(jobs) = cmd.jobs {
        config.ingest.jobs = jobs;
    }
    config.validate()?;

    let storage = open_storage(&config)?;
    let settings = IngestSettings::from_config(&config)?;
    let report = ingest::ingest_batch(cmd.files, &storage, &settings).await;

    for file in &report.files {
        let status = match &file.result {
            Ok(FileOutcome::Stored {
                records, recovered, ..
            }) => {
                if *recovered {
                    format!("stored {records} records (recovered)")
                } else {
                    format!("stored {records} records")
                }
            }
            Ok(FileOutcome::AlreadyProcessed) => "already processed".to_string(),
            Ok(FileOutcome::NoRecords) => "no telemetry records".to_string(),
            Ok(FileOutcome::NotRecognized { reason }) => format!("not recognized: {reason}"),
            Err(e) => format!("error: {e}"),
        };
        println!("{}: {status}", file.path.display());
    }

    println!();
    println!(
        "{} files, {} stored, {} records, {} skipped, {} failed",
        report.files.len(),
        report.stored(),
        report.records(),
        report.skipped(),
        report.failed()
    );

    Ok(if report.all_failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn handle_inspect(mut config: Config, cmd: &InspectCommand) -> anyhow::Result<()> {
    if let Some(scale) = cmd.accel_scale {
        config.decoder.accel_scale = scale;
    }
    config.validate()?;

    let extraction = extract_file(&cmd.file, config.layout()?, config.decode_options())
        .with_context(|| format!("failed to read {}", cmd.file.display()))?;

    if cmd.json {
        let output = serde_json::json!({
            "file": cmd.file,
            "recovered": extraction.recovered,
            "records": extraction.records().collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        if extraction.recovered {
            println!("(recovered from a damaged container)");
        }
        for record in extraction.records() {
            println!("{}", format_record(record));
        }
        println!("{} records", extraction.len());
    }
    Ok(())
}

fn handle_export(config: &Config, cmd: &ExportCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let archive = storage.load_archive(&cmd.name)?;
    let blocks = config
        .archive_codec()
        .decode(&archive)
        .with_context(|| format!("stored archive for {} is damaged", cmd.name))?;

    let options = config.decode_options();
    let records: Vec<TelemetryRecord> = blocks
        .iter()
        .map(|block| record::decode(block, &options))
        .collect();

    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Plain => {
            for record in &records {
                println!("{}", format_record(record));
            }
        }
    }
    Ok(())
}

fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let sources = storage.find_sources(&cmd.pattern)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    for source in &sources {
        println!(
            "{:<32} {}  {:>8} bytes{}",
            source.file_name,
            source.processed_on.format("%Y-%m-%d %H:%M:%S"),
            source.archive_size,
            if source.recovered { "  (recovered)" } else { "" }
        );
    }
    println!("{} files", sources.len());
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let stats = storage.stats()?;

    if json {
        let status = serde_json::json!({
            "database_path": storage.path(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        let time = |t: Option<chrono::DateTime<chrono::Utc>>| {
            t.map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
        };
        println!("dashgps status");
        println!("--------------");
        println!("Database:        {}", storage.path().display());
        println!("Size:            {} bytes", stats.db_size_bytes);
        println!("Files:           {}", stats.total_files);
        println!("Recovered files: {}", stats.recovered_files);
        println!("Data points:     {}", stats.total_points);
        println!("Oldest point:    {}", time(stats.oldest_point));
        println!("Newest point:    {}", time(stats.newest_point));
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Decoder]");
                println!("  Accel scale:        {}", config.decoder.accel_scale);
                println!("  Speed policy:       {:?}", config.decoder.speed_policy);
                println!();
                println!("[Container]");
                println!("  Target tag:         {:?}", config.container.target_tag);
                println!("  Directory tag:      {:?}", config.container.directory_tag);
                println!("  Chunk tag:          {:?}", config.container.free_tag);
                println!("  Magic:              {:?}", config.container.magic);
                println!(
                    "  Directory skip:     {}",
                    config.container.directory_header_skip
                );
                println!("  XOR key:            {:#04x}", config.container.xor_key);
                println!();
                println!("[Archive]");
                println!("  Compression level:  {}", config.archive.compression_level);
                println!();
                println!("[Ingest]");
                println!("  Jobs:               {}", config.ingest.jobs);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn format_record(record: &TelemetryRecord) -> String {
    fn show<T: ToString>(value: Option<T>) -> String {
        value.map_or_else(|| "-".to_string(), |v| v.to_string())
    }

    let mut line = format!(
        "{}  {:<9}  {:>11} {:>12}  {:>4}  {} {} {}",
        show(record.timestamp.map(|t| t.format("%Y-%m-%d %H:%M:%S"))),
        show(record.plate.as_deref()),
        show(record.latitude.map(|v| format!("{v:.6}"))),
        show(record.longitude.map(|v| format!("{v:.6}"))),
        show(record.speed),
        show(record.accel_x),
        show(record.accel_y),
        show(record.accel_z),
    );
    for error in &record.field_errors {
        line.push_str("  [");
        line.push_str(&error.to_string());
        line.push(']');
    }
    line
}
