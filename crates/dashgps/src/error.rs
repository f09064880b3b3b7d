//! Error types for dashgps.
//!
//! This module defines all error types used throughout the dashgps crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for dashgps operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Container Errors ===
    /// A read asked for more bytes than remain in the container.
    #[error("unexpected end of data: requested {requested} bytes, {remaining} remaining")]
    EndOfData {
        /// Number of bytes requested.
        requested: u64,
        /// Number of bytes left before the end of the container.
        remaining: u64,
    },

    /// A seek targeted an offset past the end of the container.
    #[error("offset {offset} is out of range for a container of {len} bytes")]
    OutOfRange {
        /// The requested absolute offset.
        offset: u64,
        /// Total container length.
        len: u64,
    },

    /// The input is not a recognized dashcam container.
    #[error("not a recognized container: {reason}")]
    NotThisFormat {
        /// Why the input was rejected.
        reason: String,
    },

    // === Archive Errors ===
    /// An archive length prefix is followed by fewer bytes than it declares.
    #[error("truncated archive: block needs {expected} bytes, {available} available")]
    TruncatedArchive {
        /// Bytes the length prefix (or the prefix itself) requires.
        expected: usize,
        /// Bytes actually left in the decompressed stream.
        available: usize,
    },

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// No processed source is stored under this name.
    #[error("no processed file named '{name}'")]
    SourceNotFound {
        /// The file name that was looked up.
        name: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to open an input file.
    #[error("failed to open {path}: {source}")]
    FileOpen {
        /// Path that couldn't be opened.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// A background task failed to complete.
    #[error("worker task failed: {0}")]
    Worker(String),

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for dashgps operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a not-this-format error.
    #[must_use]
    pub fn not_this_format(reason: impl Into<String>) -> Self {
        Self::NotThisFormat {
            reason: reason.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means the input simply isn't a dashcam container.
    #[must_use]
    pub fn is_not_this_format(&self) -> bool {
        matches!(self, Self::NotThisFormat { .. })
    }

    /// Check if this error is a container bounds violation.
    #[must_use]
    pub fn is_bounds_error(&self) -> bool {
        matches!(self, Self::EndOfData { .. } | Self::OutOfRange { .. })
    }
}
