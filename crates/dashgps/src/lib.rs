//! `dashgps` - GPS telemetry extraction for dashcam recordings
//!
//! Some dashcams store a second of GPS and accelerometer data per video
//! chunk, obfuscated, inside the atom structure of their MP4 files. This
//! library finds those samples ([`walker`]), decodes them ([`record`]),
//! archives the raw blocks ([`archive`]) and keeps everything in a local
//! database ([`storage`]).

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod reader;
pub mod record;
pub mod storage;
pub mod walker;

pub use archive::ArchiveCodec;
pub use config::Config;
pub use error::{Error, Result};
pub use ingest::{process_file, BatchReport, FileOutcome};
pub use logging::init_logging;
pub use reader::AtomReader;
pub use record::{DecodeOptions, SpeedPolicy, TelemetryRecord};
pub use storage::{Storage, StorageStats};
pub use walker::{ContainerLayout, ContainerWalker, Extraction};
