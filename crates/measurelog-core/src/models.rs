//! Data models for measurelog.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{MeasureLogError, Result};
use crate::storage;

/// Absolute and relative (%) error of one measured scalar, both rounded to 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub absolute_error: f64,
    pub relative_error: f64,
}

/// Errors of a length × width measurement.
///
/// `mean_relative_error` averages the length and width relative errors only;
/// the area term does not contribute to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement2DErrors {
    pub length: ErrorMetrics,
    pub width: ErrorMetrics,
    pub area: ErrorMetrics,
    pub mean_relative_error: f64,
}

/// Error severity bands that drive the overlay panel colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Mean relative error ≤ 5%.
    Low,
    /// 5% < mean relative error ≤ 10%.
    Medium,
    /// Mean relative error > 10%.
    High,
}

impl Severity {
    pub fn from_mean_relative_error(mean_relative_error: f64) -> Self {
        if mean_relative_error > 10.0 {
            Severity::High
        } else if mean_relative_error > 5.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
        }
    }
}

/// A raw value handed to the render entry point by the measurement tool.
///
/// Only finite `Float`/`Int` values are numeric; everything else is rejected
/// by [`Sample2D::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
    Missing,
}

impl Reading {
    /// The numeric value, if this reading is a finite number.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Reading::Float(f) => *f,
            Reading::Int(i) => *i as f64,
            _ => return None,
        };
        value.is_finite().then_some(value)
    }
}

impl std::fmt::Display for Reading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reading::Float(v) => write!(f, "{v}"),
            Reading::Int(v) => write!(f, "{v}"),
            Reading::Bool(v) => write!(f, "{v}"),
            Reading::Text(v) => write!(f, "{v:?}"),
            Reading::Missing => write!(f, "None"),
        }
    }
}

impl From<f64> for Reading {
    fn from(v: f64) -> Self {
        Reading::Float(v)
    }
}
impl From<f32> for Reading {
    fn from(v: f32) -> Self {
        Reading::Float(v as f64)
    }
}
impl From<i64> for Reading {
    fn from(v: i64) -> Self {
        Reading::Int(v)
    }
}
impl From<i32> for Reading {
    fn from(v: i32) -> Self {
        Reading::Int(v as i64)
    }
}
impl From<bool> for Reading {
    fn from(v: bool) -> Self {
        Reading::Bool(v)
    }
}
impl From<String> for Reading {
    fn from(v: String) -> Self {
        Reading::Text(v)
    }
}
impl From<&str> for Reading {
    fn from(v: &str) -> Self {
        Reading::Text(v.to_string())
    }
}
impl<T: Into<Reading>> From<Option<T>> for Reading {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Reading::Missing)
    }
}

/// One expected/measured length × width observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample2D {
    #[serde(default = "missing")]
    pub expected_length: Reading,
    #[serde(default = "missing")]
    pub measured_length: Reading,
    #[serde(default = "missing")]
    pub expected_width: Reading,
    #[serde(default = "missing")]
    pub measured_width: Reading,
}

fn missing() -> Reading {
    Reading::Missing
}

impl Default for Sample2D {
    fn default() -> Self {
        Self::new(missing(), missing(), missing(), missing())
    }
}

impl Sample2D {
    pub fn new(
        expected_length: impl Into<Reading>,
        measured_length: impl Into<Reading>,
        expected_width: impl Into<Reading>,
        measured_width: impl Into<Reading>,
    ) -> Self {
        Self {
            expected_length: expected_length.into(),
            measured_length: measured_length.into(),
            expected_width: expected_width.into(),
            measured_width: measured_width.into(),
        }
    }

    /// Shorthand for an all-numeric sample.
    pub fn numeric(
        expected_length: f64,
        measured_length: f64,
        expected_width: f64,
        measured_width: f64,
    ) -> Self {
        Self::new(expected_length, measured_length, expected_width, measured_width)
    }

    /// Returns `[expected_length, measured_length, expected_width, measured_width]`
    /// or an `InvalidInput` error naming all four raw values.
    pub fn validate(&self) -> Result<[f64; 4]> {
        match (
            self.expected_length.as_f64(),
            self.measured_length.as_f64(),
            self.expected_width.as_f64(),
            self.measured_width.as_f64(),
        ) {
            (Some(el), Some(ml), Some(ew), Some(mw)) => Ok([el, ml, ew, mw]),
            _ => Err(MeasureLogError::InvalidInput(format!(
                "{}, {}, {}, {}",
                self.expected_length, self.measured_length, self.expected_width, self.measured_width
            ))),
        }
    }
}

/// Names used for the expected/measured columns of the overlay text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    pub expected: String,
    pub measured: String,
}

impl Labels {
    pub fn new(expected: impl Into<String>, measured: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            measured: measured.into(),
        }
    }
}

impl Default for Labels {
    fn default() -> Self {
        Self::new("Expected", "Measured")
    }
}

/// Timestamp format of the `Timestamp` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One persisted observation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub expected_length: f64,
    pub measured_length: f64,
    pub length_error_abs: f64,
    pub length_error_rel: f64,
    pub expected_width: f64,
    pub measured_width: f64,
    pub width_error_abs: f64,
    pub width_error_rel: f64,
    pub area_error_rel: f64,
    pub mean_error: f64,
}

impl LogRecord {
    /// Build a record stamped with the current local time (second precision).
    pub fn now(values: [f64; 4], errors: &Measurement2DErrors) -> Self {
        let now = Local::now().naive_local();
        let timestamp = now.with_nanosecond(0).unwrap_or(now);
        Self::at(timestamp, values, errors)
    }

    pub fn at(timestamp: NaiveDateTime, values: [f64; 4], errors: &Measurement2DErrors) -> Self {
        let [expected_length, measured_length, expected_width, measured_width] = values;
        Self {
            timestamp,
            expected_length,
            measured_length,
            length_error_abs: errors.length.absolute_error,
            length_error_rel: errors.length.relative_error,
            expected_width,
            measured_width,
            width_error_abs: errors.width.absolute_error,
            width_error_rel: errors.width.relative_error,
            area_error_rel: errors.area.relative_error,
            mean_error: errors.mean_relative_error,
        }
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Runtime configuration, usually loaded from a YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
    /// Directory holding persisted logs and analysis charts
    pub log_dir: PathBuf,
    /// Number of bins of the error histograms
    pub histogram_bins: usize,
    /// Frame size used when replaying samples
    pub frame_width: u32,
    pub frame_height: u32,
    /// Top-left text anchor of the error panel
    pub anchor_x: i32,
    pub anchor_y: i32,
    pub expected_name: String,
    pub measured_name: String,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("measurement_logs"),
            histogram_bins: 10,
            frame_width: 640,
            frame_height: 480,
            anchor_x: 20,
            anchor_y: 50,
            expected_name: "Expected".to_string(),
            measured_name: "Measured".to_string(),
        }
    }
}

impl MeasureConfig {
    /// Load from a YAML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        storage::load_yaml(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        storage::save_yaml(path, self)
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    pub fn labels(&self) -> Labels {
        Labels::new(&self.expected_name, &self.measured_name)
    }
}
