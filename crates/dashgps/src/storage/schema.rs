//! `SQLite` schema definitions for dashgps.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the table of processed files.
///
/// `processed_on` is unix time in seconds. `compressed_data_points` holds the
/// archive of raw telemetry blocks for the file.
pub const CREATE_FILES_INFO_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS files_info (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_name TEXT NOT NULL UNIQUE,
    processed_on REAL NOT NULL,
    compressed_data_points BLOB NOT NULL
)
";

/// SQL statement to create the table of decoded samples.
///
/// `seq` is the sample's position in the file's directory.
pub const CREATE_DATA_POINTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS data_points (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    files_info_id INTEGER NOT NULL REFERENCES files_info(id) ON DELETE CASCADE,
    seq INTEGER NOT NULL,
    time REAL,
    license_plate TEXT,
    latitude REAL,
    longitude REAL,
    speed INTEGER,
    accel1 REAL,
    accel2 REAL,
    accel3 REAL
)
";

/// SQL statement to create an index on the owning file for per-file reads.
pub const CREATE_FILE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_data_points_file ON data_points(files_info_id, seq)
";

/// SQL statement to create an index on sample time.
pub const CREATE_TIME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_data_points_time ON data_points(time)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_FILES_INFO_TABLE,
    CREATE_DATA_POINTS_TABLE,
    CREATE_FILE_INDEX,
    CREATE_TIME_INDEX,
    CREATE_METADATA_TABLE,
];
