//! Processing of dashcam files into storage.
//!
//! [`process_file`] handles a single file end to end. [`ingest_batch`] walks
//! many files concurrently on blocking workers while keeping every database
//! write on the calling task, in input order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::archive::ArchiveCodec;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::record::DecodeOptions;
use crate::storage::Storage;
use crate::walker::{extract_file, ContainerLayout, Extraction};

/// What happened to one input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Records were archived and stored.
    Stored {
        /// Row id of the registered file.
        file_id: i64,
        /// Number of records stored.
        records: usize,
        /// Whether the records came from the recovery scan.
        recovered: bool,
    },
    /// A file with the same name was processed before.
    AlreadyProcessed,
    /// The file has the telemetry directory but no usable records.
    NoRecords,
    /// The file is not a dashcam container.
    NotRecognized {
        /// Why the file was not recognized.
        reason: String,
    },
}

/// Outcome of one file in a batch.
#[derive(Debug)]
pub struct FileReport {
    /// The input path.
    pub path: PathBuf,
    /// The outcome, or the error that stopped this file.
    pub result: Result<FileOutcome>,
}

/// Outcomes of a whole batch, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Per-file reports.
    pub files: Vec<FileReport>,
}

impl BatchReport {
    /// Number of files whose records were stored.
    #[must_use]
    pub fn stored(&self) -> usize {
        self.count(|outcome| matches!(outcome, FileOutcome::Stored { .. }))
    }

    /// Total number of records stored.
    #[must_use]
    pub fn records(&self) -> usize {
        self.files
            .iter()
            .filter_map(|report| match report.result {
                Ok(FileOutcome::Stored { records, .. }) => Some(records),
                _ => None,
            })
            .sum()
    }

    /// Number of files skipped because they were processed before.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, FileOutcome::AlreadyProcessed))
    }

    /// Number of files that failed with an error.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.files.iter().filter(|r| r.result.is_err()).count()
    }

    /// Whether the batch was non-empty and every file failed.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        !self.files.is_empty() && self.failed() == self.files.len()
    }

    fn count(&self, predicate: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files
            .iter()
            .filter(|report| report.result.as_ref().is_ok_and(&predicate))
            .count()
    }
}

/// Settings shared by every file of a run.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Where telemetry lives in the container.
    pub layout: ContainerLayout,
    /// How blocks are decoded.
    pub options: DecodeOptions,
    /// How raw blocks are archived.
    pub codec: ArchiveCodec,
    /// Maximum number of concurrent walks.
    pub jobs: usize,
}

impl IngestSettings {
    /// Build settings from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the container tags are invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            layout: config.layout()?,
            options: config.decode_options(),
            codec: config.archive_codec(),
            jobs: config.ingest.jobs.max(1),
        })
    }
}

/// Name under which a file is registered: its base name.
#[must_use]
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy())
        .into_owned()
}

/// Process a single file and store its records.
///
/// # Errors
///
/// Returns an error if the file cannot be read or storage fails. A file
/// that is not a dashcam container is an outcome, not an error.
pub fn process_file(path: &Path, storage: &Storage, settings: &IngestSettings) -> Result<FileOutcome> {
    let name = source_name(path);
    if storage.is_processed(&name)? {
        debug!("Skipping {}: already processed", name);
        return Ok(FileOutcome::AlreadyProcessed);
    }

    let extraction = extract_file(path, settings.layout, settings.options);
    store_extraction(&name, extraction, storage, &settings.codec)
}

fn store_extraction(
    name: &str,
    extraction: Result<Extraction>,
    storage: &Storage,
    codec: &ArchiveCodec,
) -> Result<FileOutcome> {
    let extraction = match extraction {
        Ok(extraction) => extraction,
        Err(Error::NotThisFormat { reason }) => {
            info!("{}: not a dashcam file ({})", name, reason);
            return Ok(FileOutcome::NotRecognized { reason });
        }
        Err(e) => return Err(e),
    };

    if extraction.is_empty() {
        info!("{}: no telemetry records", name);
        return Ok(FileOutcome::NoRecords);
    }

    let recovered = extraction.recovered;
    let (records, payloads) = extraction.into_parts();
    let archive = codec.encode(&payloads)?;

    match storage.record_extraction(name, Utc::now(), &archive, recovered, &records)? {
        Some(file_id) => {
            info!(
                "{}: stored {} records{}",
                name,
                records.len(),
                if recovered { " (recovered)" } else { "" }
            );
            Ok(FileOutcome::Stored {
                file_id,
                records: records.len(),
                recovered,
            })
        }
        None => {
            debug!("{}: registered by an earlier file in this run", name);
            Ok(FileOutcome::AlreadyProcessed)
        }
    }
}

/// Process many files.
///
/// Up to `settings.jobs` files are walked at once on blocking workers.
/// Results are stored one at a time in input order, so the outcome of each
/// file is the same as running [`process_file`] on them in sequence. A
/// failing file is reported and never stops the batch.
pub async fn ingest_batch(
    paths: Vec<PathBuf>,
    storage: &Storage,
    settings: &IngestSettings,
) -> BatchReport {
    let semaphore = Arc::new(Semaphore::new(settings.jobs.max(1)));
    let mut pending = Vec::with_capacity(paths.len());

    for path in paths {
        let name = source_name(&path);
        let walk = match storage.is_processed(&name) {
            Ok(true) => {
                debug!("Skipping {}: already processed", name);
                None
            }
            Ok(false) => Some(spawn_walk(
                path.clone(),
                settings.clone(),
                Arc::clone(&semaphore),
            )),
            Err(e) => {
                pending.push((path, name, Err(e)));
                continue;
            }
        };
        pending.push((path, name, Ok(walk)));
    }

    let mut report = BatchReport::default();
    for (path, name, walk) in pending {
        let result = match walk {
            Err(e) => Err(e),
            Ok(None) => Ok(FileOutcome::AlreadyProcessed),
            Ok(Some(handle)) => match handle.await {
                Ok(extraction) => store_extraction(&name, extraction, storage, &settings.codec),
                Err(e) => Err(Error::Worker(e.to_string())),
            },
        };

        if let Err(e) = &result {
            warn!("{}: {}", path.display(), e);
        }
        report.files.push(FileReport { path, result });
    }

    report
}

fn spawn_walk(
    path: PathBuf,
    settings: IngestSettings,
    semaphore: Arc<Semaphore>,
) -> tokio::task::JoinHandle<Result<Extraction>> {
    tokio::spawn(async move {
        let _permit = semaphore
            .acquire_owned()
            .await
            .map_err(|e| Error::Worker(e.to_string()))?;
        tokio::task::spawn_blocking(move || extract_file(&path, settings.layout, settings.options))
            .await
            .map_err(|e| Error::Worker(e.to_string()))?
    })
}
