//! Decoding of the fixed-width telemetry block.
//!
//! Each GPS sub-atom carries one 261-byte block of ASCII fields at fixed
//! offsets once the obfuscation has been removed. [`decode`] turns such a
//! block into a [`TelemetryRecord`]. It never fails: a block of the wrong
//! length yields an unparsed record, and a malformed field yields an absent
//! value plus a [`FieldError`] on the record.

use std::ops::Range;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Exact length of a telemetry block.
pub const RECORD_LEN: usize = 261;

const DATE_TIME: Range<usize> = 10..24;
const PLATE: Range<usize> = 25..34;
const LATITUDE: Range<usize> = 40..49;
const LONGITUDE: Range<usize> = 49..59;
const SPEED: Range<usize> = 59..67;
const ACCEL_X: Range<usize> = 175..179;
const ACCEL_Y: Range<usize> = 179..183;
const ACCEL_Z: Range<usize> = 183..187;

const DATE_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Whether speed is reported for samples without a GPS fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedPolicy {
    /// Only report speed when both latitude and longitude are present.
    #[default]
    GateOnFix,
    /// Always report speed, as older firmware output was read.
    Always,
}

/// Camera/firmware dependent decoding parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeOptions {
    /// Divisor turning the raw accelerometer integers into units of g.
    pub accel_scale: f64,
    /// Speed reporting rule.
    pub speed_policy: SpeedPolicy,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            accel_scale: 10.0,
            speed_policy: SpeedPolicy::GateOnFix,
        }
    }
}

/// A field of the telemetry block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Date and time of the sample.
    Timestamp,
    /// Latitude.
    Latitude,
    /// Longitude.
    Longitude,
    /// Ground speed.
    Speed,
    /// First accelerometer axis.
    AccelX,
    /// Second accelerometer axis.
    AccelY,
    /// Third accelerometer axis.
    AccelZ,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timestamp => write!(f, "timestamp"),
            Self::Latitude => write!(f, "latitude"),
            Self::Longitude => write!(f, "longitude"),
            Self::Speed => write!(f, "speed"),
            Self::AccelX => write!(f, "accel_x"),
            Self::AccelY => write!(f, "accel_y"),
            Self::AccelZ => write!(f, "accel_z"),
        }
    }
}

/// A field whose bytes could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Which field failed.
    pub field: Field,
    /// The offending bytes, lossily decoded.
    pub raw: String,
}

impl FieldError {
    fn new(field: Field, bytes: &[u8]) -> Self {
        Self {
            field,
            raw: String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed {}: {:?}", self.field, self.raw)
    }
}

/// One decoded GPS/accelerometer sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetryRecord {
    /// When the sample was taken.
    pub timestamp: Option<DateTime<Utc>>,
    /// License plate configured on the camera.
    pub plate: Option<String>,
    /// Signed decimal degrees, north positive.
    pub latitude: Option<f64>,
    /// Signed decimal degrees, east positive.
    pub longitude: Option<f64>,
    /// Ground speed as reported by the camera.
    pub speed: Option<i32>,
    /// Acceleration in g.
    pub accel_x: Option<f64>,
    /// Acceleration in g.
    pub accel_y: Option<f64>,
    /// Acceleration in g.
    pub accel_z: Option<f64>,
    /// Fields that were present but malformed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
    #[serde(skip)]
    parsed: bool,
}

impl TelemetryRecord {
    /// A record with every field absent.
    #[must_use]
    pub fn unparsed() -> Self {
        Self::default()
    }

    /// Whether the source block had the expected length.
    #[must_use]
    pub fn is_parsed(&self) -> bool {
        self.parsed
    }

    /// Whether both coordinates are present.
    #[must_use]
    pub fn has_fix(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Decode one de-obfuscated telemetry block.
#[must_use]
pub fn decode(raw: &[u8], options: &DecodeOptions) -> TelemetryRecord {
    if raw.len() != RECORD_LEN {
        return TelemetryRecord::unparsed();
    }

    let mut errors = Vec::new();

    let timestamp = keep(&mut errors, decode_timestamp(&raw[DATE_TIME]));
    let latitude = keep(
        &mut errors,
        decode_coordinate(&raw[LATITUDE], 2, (b'N', b'S'), Field::Latitude),
    )
    .flatten();
    let longitude = keep(
        &mut errors,
        decode_coordinate(&raw[LONGITUDE], 3, (b'E', b'W'), Field::Longitude),
    )
    .flatten();

    let speed = match options.speed_policy {
        SpeedPolicy::GateOnFix if latitude.is_none() || longitude.is_none() => None,
        _ => keep(&mut errors, parse_int::<i32>(&raw[SPEED], Field::Speed)),
    };

    let scale = options.accel_scale;
    let accel_x = keep(&mut errors, decode_accel(&raw[ACCEL_X], scale, Field::AccelX));
    let accel_y = keep(&mut errors, decode_accel(&raw[ACCEL_Y], scale, Field::AccelY));
    let accel_z = keep(&mut errors, decode_accel(&raw[ACCEL_Z], scale, Field::AccelZ));

    TelemetryRecord {
        timestamp,
        plate: decode_plate(&raw[PLATE]),
        latitude,
        longitude,
        speed,
        accel_x,
        accel_y,
        accel_z,
        field_errors: errors,
        parsed: true,
    }
}

fn keep<T>(errors: &mut Vec<FieldError>, result: Result<T, FieldError>) -> Option<T> {
    result.map_err(|err| errors.push(err)).ok()
}

fn decode_timestamp(bytes: &[u8]) -> Result<DateTime<Utc>, FieldError> {
    let error = || FieldError::new(Field::Timestamp, bytes);
    let text = std::str::from_utf8(bytes).map_err(|_| error())?;
    let naive = NaiveDateTime::parse_from_str(text, DATE_TIME_FORMAT).map_err(|_| error())?;
    // The camera clock has no zone; read it as the local calendar.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(error)
}

fn decode_plate(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Hemisphere flag, whole degrees, then six digits of 1/10000 minute.
fn decode_coordinate(
    bytes: &[u8],
    degree_digits: usize,
    (positive, negative): (u8, u8),
    field: Field,
) -> Result<Option<f64>, FieldError> {
    let sign = match bytes.first() {
        Some(&flag) if flag == positive => 1.0,
        Some(&flag) if flag == negative => -1.0,
        _ => return Ok(None),
    };

    let degrees: u32 = parse_int(&bytes[1..=degree_digits], field)
        .map_err(|_| FieldError::new(field, bytes))?;
    let minutes_e4: u32 = parse_int(&bytes[bytes.len() - 6..], field)
        .map_err(|_| FieldError::new(field, bytes))?;

    let minutes = f64::from(minutes_e4) / 10_000.0;
    Ok(Some(sign * (f64::from(degrees) + minutes / 60.0)))
}

fn decode_accel(bytes: &[u8], scale: f64, field: Field) -> Result<f64, FieldError> {
    parse_int::<i32>(bytes, field).map(|value| f64::from(value) / scale)
}

fn parse_int<T: std::str::FromStr>(bytes: &[u8], field: Field) -> Result<T, FieldError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|text| text.trim().parse().ok())
        .ok_or_else(|| FieldError::new(field, bytes))
}

/// Build a well-formed block for tests elsewhere in the crate.
#[cfg(test)]
pub(crate) fn sample_block() -> Vec<u8> {
    tests::block(
        "20230415123045",
        "AB123CD",
        "N37461234",
        "W122251234",
        "00000042",
        ["0010", "-005", "0098"],
    )
}
