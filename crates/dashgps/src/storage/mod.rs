//! Storage layer for dashgps.
//!
//! This module provides `SQLite`-based persistent storage for processed
//! files: one `files_info` row per file name, holding the compressed archive
//! of its raw telemetry, plus one `data_points` row per decoded sample.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::TelemetryRecord;

/// Storage engine for processed dashcam files.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

/// A processed file as registered in storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceInfo {
    /// Row id, referenced by its data points.
    pub id: i64,
    /// Base name of the source file.
    pub file_name: String,
    /// When the file was processed.
    pub processed_on: DateTime<Utc>,
    /// Size of the stored archive in bytes.
    pub archive_size: usize,
    /// Whether the samples came from the recovery scan.
    pub recovered: bool,
}

/// A stored sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    /// When the sample was taken.
    pub timestamp: Option<DateTime<Utc>>,
    /// License plate.
    pub plate: Option<String>,
    /// Latitude in decimal degrees.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees.
    pub longitude: Option<f64>,
    /// Ground speed.
    pub speed: Option<i32>,
    /// Acceleration in g.
    pub accel_x: Option<f64>,
    /// Acceleration in g.
    pub accel_y: Option<f64>,
    /// Acceleration in g.
    pub accel_z: Option<f64>,
}

impl From<&TelemetryRecord> for DataPoint {
    fn from(record: &TelemetryRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            plate: record.plate.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            speed: record.speed,
            accel_x: record.accel_x,
            accel_y: record.accel_y,
            accel_z: record.accel_z,
        }
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Number of processed files.
    pub total_files: i64,
    /// Number of stored samples.
    pub total_points: i64,
    /// Files whose samples came from the recovery scan.
    pub recovered_files: i64,
    /// Timestamp of the oldest sample.
    pub oldest_point: Option<DateTime<Utc>>,
    /// Timestamp of the newest sample.
    pub newest_point: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[allow(clippy::cast_precision_loss)]
fn to_unix_seconds(time: DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 1000.0
}

#[allow(clippy::cast_possible_truncation)]
fn from_unix_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64)
}

fn register(
    conn: &Connection,
    file_name: &str,
    processed_on: DateTime<Utc>,
    archive: &[u8],
    recovered: bool,
) -> Result<Option<i64>> {
    let inserted = conn.execute(
        r"
        INSERT INTO files_info (file_name, processed_on, compressed_data_points, recovered)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(file_name) DO NOTHING
        ",
        params![file_name, to_unix_seconds(processed_on), archive, recovered],
    )?;

    if inserted == 0 {
        debug!("File {} was already processed", file_name);
        return Ok(None);
    }
    Ok(Some(conn.last_insert_rowid()))
}

fn insert_points(conn: &Connection, file_id: i64, records: &[TelemetryRecord]) -> Result<usize> {
    let mut stmt = conn.prepare(
        r"
        INSERT INTO data_points
            (files_info_id, seq, time, license_plate, latitude, longitude, speed, accel1, accel2, accel3)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ",
    )?;

    for (seq, record) in records.iter().enumerate() {
        let seq = i64::try_from(seq).unwrap_or(i64::MAX);
        stmt.execute(params![
            file_id,
            seq,
            record.timestamp.map(to_unix_seconds),
            record.plate,
            record.latitude,
            record.longitude,
            record.speed,
            record.accel_x,
            record.accel_y,
            record.accel_z,
        ])?;
    }
    Ok(records.len())
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register a processed file.
    ///
    /// Returns the new row id, or `None` if a file with this name was
    /// already registered (nothing is changed in that case).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn register_source(
        &self,
        file_name: &str,
        processed_on: DateTime<Utc>,
        archive: &[u8],
        recovered: bool,
    ) -> Result<Option<i64>> {
        register(&self.conn, file_name, processed_on, archive, recovered)
    }

    /// Store decoded samples for a registered file, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails, including when
    /// `file_id` doesn't refer to a registered file.
    pub fn add_data_points(&self, file_id: i64, records: &[TelemetryRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let count = insert_points(&tx, file_id, records)?;
        tx.commit()?;
        Ok(count)
    }

    /// Register a file and store its samples in one transaction.
    ///
    /// Returns `None`, storing nothing, if the file was already registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn record_extraction(
        &self,
        file_name: &str,
        processed_on: DateTime<Utc>,
        archive: &[u8],
        recovered: bool,
        records: &[TelemetryRecord],
    ) -> Result<Option<i64>> {
        let tx = self.conn.unchecked_transaction()?;
        let Some(file_id) = register(&tx, file_name, processed_on, archive, recovered)? else {
            return Ok(None);
        };
        let count = insert_points(&tx, file_id, records)?;
        tx.commit()?;

        debug!("Stored {} data points for {} (id {})", count, file_name, file_id);
        Ok(Some(file_id))
    }

    /// Check whether a file name was already processed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn is_processed(&self, file_name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM files_info WHERE file_name = ?1",
            [file_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Get a processed file by exact name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_source(&self, file_name: &str) -> Result<Option<SourceInfo>> {
        let result = self
            .conn
            .query_row(
                r"
                SELECT id, file_name, processed_on, length(compressed_data_points), recovered
                FROM files_info WHERE file_name = ?1
                ",
                [file_name],
                Self::row_to_source,
            )
            .optional()?;
        Ok(result)
    }

    /// Find processed files whose name matches a SQL `LIKE` pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_sources(&self, pattern: &str) -> Result<Vec<SourceInfo>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, file_name, processed_on, length(compressed_data_points), recovered
            FROM files_info WHERE file_name LIKE ?1 ORDER BY file_name
            ",
        )?;

        let sources = stmt
            .query_map([pattern], Self::row_to_source)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    /// Load the archive stored for a file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceNotFound`] if no file has this name.
    pub fn load_archive(&self, file_name: &str) -> Result<Vec<u8>> {
        self.conn
            .query_row(
                "SELECT compressed_data_points FROM files_info WHERE file_name = ?1",
                [file_name],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::SourceNotFound {
                name: file_name.to_string(),
            })
    }

    /// Get a file's samples in their original order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn data_points(&self, file_id: i64) -> Result<Vec<DataPoint>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT time, license_plate, latitude, longitude, speed, accel1, accel2, accel3
            FROM data_points WHERE files_info_id = ?1 ORDER BY seq
            ",
        )?;

        let points = stmt
            .query_map([file_id], Self::row_to_point)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(points)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let (total_files, recovered_files): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(recovered), 0) FROM files_info",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let (total_points, oldest, newest): (i64, Option<f64>, Option<f64>) = self.conn.query_row(
            "SELECT COUNT(*), MIN(time), MAX(time) FROM data_points",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_files,
            total_points,
            recovered_files,
            oldest_point: oldest.and_then(from_unix_seconds),
            newest_point: newest.and_then(from_unix_seconds),
            db_size_bytes,
        })
    }

    fn row_to_source(row: &rusqlite::Row) -> rusqlite::Result<SourceInfo> {
        let processed_on: f64 = row.get(2)?;
        let archive_size: i64 = row.get(3)?;
        Ok(SourceInfo {
            id: row.get(0)?,
            file_name: row.get(1)?,
            processed_on: from_unix_seconds(processed_on).unwrap_or_default(),
            archive_size: usize::try_from(archive_size).unwrap_or(0),
            recovered: row.get(4)?,
        })
    }

    fn row_to_point(row: &rusqlite::Row) -> rusqlite::Result<DataPoint> {
        let time: Option<f64> = row.get(0)?;
        Ok(DataPoint {
            timestamp: time.and_then(from_unix_seconds),
            plate: row.get(1)?,
            latitude: row.get(2)?,
            longitude: row.get(3)?,
            speed: row.get(4)?,
            accel_x: row.get(5)?,
            accel_y: row.get(6)?,
            accel_z: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive;
    use crate::record::{decode, sample_block, DecodeOptions};

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn sample_records() -> Vec<TelemetryRecord> {
        let first = decode(&sample_block(), &DecodeOptions::default());
        let mut other = sample_block();
        other[25..34].copy_from_slice(b"         ");
        other[40] = b'X';
        let second = decode(&other, &DecodeOptions::default());
        vec![first, second]
    }

    fn processed_on() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_open_in_memory() {
        let storage = Storage::open_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_register_and_get() {
        let storage = create_test_storage();
        let id = storage
            .register_source("FILE0001.MP4", processed_on(), b"archive", false)
            .unwrap();
        assert!(id.is_some());

        let source = storage.get_source("FILE0001.MP4").unwrap().unwrap();
        assert_eq!(source.id, id.unwrap());
        assert_eq!(source.file_name, "FILE0001.MP4");
        assert_eq!(source.processed_on, processed_on());
        assert_eq!(source.archive_size, 7);
        assert!(!source.recovered);
    }

    #[test]
    fn test_register_twice_is_reported() {
        let storage = create_test_storage();
        let first = storage
            .register_source("FILE0001.MP4", processed_on(), b"one", false)
            .unwrap();
        let second = storage
            .register_source("FILE0001.MP4", Utc::now(), b"two", true)
            .unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(storage.load_archive("FILE0001.MP4").unwrap(), b"one");
    }

    #[test]
    fn test_add_data_points_preserves_order() {
        let storage = create_test_storage();
        let records = sample_records();
        let id = storage
            .register_source("FILE0001.MP4", processed_on(), b"", false)
            .unwrap()
            .unwrap();

        assert_eq!(storage.add_data_points(id, &records).unwrap(), 2);

        let points = storage.data_points(id).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], DataPoint::from(&records[0]));
        assert_eq!(points[0].plate.as_deref(), Some("AB123CD"));
        assert!(points[1].plate.is_none());
        assert!(points[1].latitude.is_none());
        assert!(points[1].speed.is_none());
    }

    #[test]
    fn test_add_data_points_requires_registered_file() {
        let storage = create_test_storage();
        assert!(storage.add_data_points(42, &sample_records()).is_err());
    }

    #[test]
    fn test_record_extraction() {
        let storage = create_test_storage();
        let records = sample_records();
        let blocks = vec![sample_block(); 2];
        let archive = archive::encode(&blocks).unwrap();

        let id = storage
            .record_extraction("FILE0002.MP4", processed_on(), &archive, true, &records)
            .unwrap()
            .unwrap();

        assert!(storage.is_processed("FILE0002.MP4").unwrap());
        assert!(storage.get_source("FILE0002.MP4").unwrap().unwrap().recovered);
        assert_eq!(storage.data_points(id).unwrap().len(), 2);
        let stored = storage.load_archive("FILE0002.MP4").unwrap();
        assert_eq!(archive::decode(&stored).unwrap(), blocks);
    }

    #[test]
    fn test_record_extraction_twice_stores_nothing_more() {
        let storage = create_test_storage();
        let records = sample_records();

        storage
            .record_extraction("FILE0003.MP4", processed_on(), b"a", false, &records)
            .unwrap();
        let second = storage
            .record_extraction("FILE0003.MP4", processed_on(), b"b", false, &records)
            .unwrap();

        assert!(second.is_none());
        assert_eq!(storage.stats().unwrap().total_points, 2);
    }

    #[test]
    fn test_is_processed_unknown() {
        let storage = create_test_storage();
        assert!(!storage.is_processed("nope.MP4").unwrap());
    }

    #[test]
    fn test_load_archive_unknown() {
        let storage = create_test_storage();
        let err = storage.load_archive("nope.MP4").unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
    }

    #[test]
    fn test_find_sources() {
        let storage = create_test_storage();
        for name in ["2023_0415_A.MP4", "2023_0415_B.MP4", "2023_0416_A.MP4"] {
            storage
                .register_source(name, processed_on(), b"", false)
                .unwrap();
        }

        let found = storage.find_sources("2023_0415%").unwrap();
        let names: Vec<_> = found.iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(names, vec!["2023_0415_A.MP4", "2023_0415_B.MP4"]);
        assert!(storage.find_sources("%.AVI").unwrap().is_empty());
    }

    #[test]
    fn test_stats_empty() {
        let storage = create_test_storage();
        let stats = storage.stats().unwrap();

        assert_eq!(stats.total_files, 0);
        assert_eq!(stats.total_points, 0);
        assert_eq!(stats.recovered_files, 0);
        assert!(stats.oldest_point.is_none());
        assert!(stats.newest_point.is_none());
    }

    #[test]
    fn test_stats_with_data() {
        let storage = create_test_storage();
        storage
            .record_extraction("a.MP4", processed_on(), b"", true, &sample_records())
            .unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.total_files, 1);
        assert_eq!(stats.total_points, 2);
        assert_eq!(stats.recovered_files, 1);
        assert_eq!(stats.oldest_point, sample_records()[0].timestamp);
        assert_eq!(stats.newest_point, stats.oldest_point);
    }

    #[test]
    fn test_unix_seconds_round_trip() {
        let time = DateTime::from_timestamp_millis(1_681_561_845_250).unwrap();
        assert_eq!(from_unix_seconds(to_unix_seconds(time)), Some(time));
    }

    #[test]
    fn test_path() {
        let storage = create_test_storage();
        assert_eq!(storage.path().to_string_lossy(), ":memory:");
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let nested_path = std::env::temp_dir().join(format!(
            "dashgps_test_{}/nested/dashcam.db",
            std::process::id()
        ));

        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }

        let storage = Storage::open(&nested_path).unwrap();
        assert!(nested_path.exists());
        storage
            .register_source("FILE0001.MP4", processed_on(), b"", false)
            .unwrap();
        assert!(storage.stats().unwrap().db_size_bytes > 0);

        drop(storage);
        if let Some(root) = nested_path.parent().and_then(Path::parent) {
            let _ = std::fs::remove_dir_all(root);
        }
    }
}
