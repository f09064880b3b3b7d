//! Configuration management for dashgps.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::archive::{ArchiveCodec, DEFAULT_LEVEL};
use crate::error::{Error, Result};
use crate::record::{DecodeOptions, SpeedPolicy};
use crate::walker::ContainerLayout;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "dashgps";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "dashcam.db";

/// Environment variable prefix.
const ENV_PREFIX: &str = "DASHGPS_";

/// Largest accepted gap between a directory header and its first entry.
pub const MAX_DIRECTORY_HEADER_SKIP: u64 = 4096;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `DASHGPS_`, `__` between sections)
/// 2. TOML config file at `~/.config/dashgps/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Telemetry decoding configuration.
    pub decoder: DecoderConfig,
    /// Container layout configuration.
    pub container: ContainerConfig,
    /// Archive configuration.
    pub archive: ArchiveConfig,
    /// Batch ingest configuration.
    pub ingest: IngestConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/dashgps/dashcam.db`
    pub database_path: Option<PathBuf>,
}

/// Telemetry decoding configuration.
///
/// Firmware revisions disagree on both of these, so they are left to the
/// user rather than guessed from the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Divisor applied to the raw accelerometer integers.
    pub accel_scale: f64,
    /// Whether speed is kept for samples without a GPS fix.
    pub speed_policy: SpeedPolicy,
}

/// Tags and constants used to find telemetry in a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Top-level atom holding the telemetry directory.
    pub target_tag: String,
    /// Directory atom tag.
    pub directory_tag: String,
    /// Tag of each telemetry chunk.
    pub free_tag: String,
    /// Magic literal opening each telemetry chunk.
    pub magic: String,
    /// Bytes between the directory header and its first entry.
    pub directory_header_skip: u64,
    /// XOR key applied to payload bytes.
    pub xor_key: u8,
}

/// Archive configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// gzip compression level, 0-9.
    pub compression_level: u32,
}

/// Batch ingest configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum number of files walked concurrently.
    pub jobs: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        let options = DecodeOptions::default();
        Self {
            accel_scale: options.accel_scale,
            speed_policy: options.speed_policy,
        }
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        let layout = ContainerLayout::default();
        Self {
            target_tag: tag_string(&layout.target_tag),
            directory_tag: tag_string(&layout.directory_tag),
            free_tag: tag_string(&layout.free_tag),
            magic: tag_string(&layout.magic),
            directory_header_skip: layout.directory_header_skip,
            xor_key: layout.xor_key,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_LEVEL,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { jobs: 4 }
    }
}

fn tag_string(tag: &[u8; 4]) -> String {
    String::from_utf8_lossy(tag).into_owned()
}

fn parse_tag(name: &str, value: &str) -> Result<[u8; 4]> {
    <[u8; 4]>::try_from(value.as_bytes()).map_err(|_| Error::ConfigValidation {
        message: format!("{name} must be exactly 4 bytes, got {value:?}"),
    })
}

impl Config {
    /// Load configuration, reading `config_path` or the default file.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `DASHGPS_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let scale = self.decoder.accel_scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::ConfigValidation {
                message: format!("accel_scale must be a positive number, got {scale}"),
            });
        }

        self.layout()?;

        if self.container.directory_header_skip > MAX_DIRECTORY_HEADER_SKIP {
            return Err(Error::ConfigValidation {
                message: format!(
                    "directory_header_skip must be at most {MAX_DIRECTORY_HEADER_SKIP}, got {}",
                    self.container.directory_header_skip
                ),
            });
        }

        if self.archive.compression_level > 9 {
            return Err(Error::ConfigValidation {
                message: format!(
                    "compression_level must be between 0 and 9, got {}",
                    self.archive.compression_level
                ),
            });
        }

        if self.ingest.jobs == 0 {
            return Err(Error::ConfigValidation {
                message: "jobs must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Decoder options described by this configuration.
    #[must_use]
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            accel_scale: self.decoder.accel_scale,
            speed_policy: self.decoder.speed_policy,
        }
    }

    /// Container layout described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a tag is not exactly four bytes.
    pub fn layout(&self) -> Result<ContainerLayout> {
        let container = &self.container;
        Ok(ContainerLayout {
            target_tag: parse_tag("target_tag", &container.target_tag)?,
            directory_tag: parse_tag("directory_tag", &container.directory_tag)?,
            free_tag: parse_tag("free_tag", &container.free_tag)?,
            magic: parse_tag("magic", &container.magic)?,
            directory_header_skip: container.directory_header_skip,
            xor_key: container.xor_key,
        })
    }

    /// Archive codec described by this configuration.
    #[must_use]
    pub fn archive_codec(&self) -> ArchiveCodec {
        ArchiveCodec::new(self.archive.compression_level)
    }
}
