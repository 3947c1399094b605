//! Measurement log: the in-process record sequence and its persistence.
//!
//! [`MeasurementLog`] owns the ordered records and is their only writer.
//! [`LoggedOverlay`] decorates any [`ErrorOverlay`] so that every 2D error box
//! drawn through it also appends a [`LogRecord`], without changing what ends up
//! on the frame.
//!
//! The log is single-threaded by construction (`&mut` access everywhere).
//! Capture loops running on several threads must wrap it in their own lock.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::calculator::calculate_2d_error;
use crate::canvas::{Canvas, Point};
use crate::error::Result;
use crate::models::{Labels, LogRecord, MeasureConfig, Sample2D};
use crate::overlay::ErrorOverlay;
use crate::storage::{self, LOG_FILE_EXTENSION, LOG_FILE_PREFIX};

/// Append-only log of measurement records.
///
/// Records are never removed: each successful flush writes a snapshot of the
/// whole log to a new file. A flush with nothing appended since the previous
/// successful one does no I/O. Dropping the log flushes anything unsaved.
pub struct MeasurementLog {
    log_dir: PathBuf,
    records: Vec<LogRecord>,
    /// Number of records covered by the last successful flush
    persisted: usize,
}

impl MeasurementLog {
    /// Open an empty log persisting into `config.log_dir`.
    ///
    /// The directory is only created when the first flush happens.
    pub fn open(config: &MeasureConfig) -> Self {
        Self::in_dir(config.log_dir.clone())
    }

    pub fn in_dir(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            records: Vec::new(),
            persisted: 0,
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Append a record; returns the new record count.
    pub fn append(&mut self, record: LogRecord) -> usize {
        self.records.push(record);
        self.records.len()
    }

    /// Compute the errors of `sample` and append them, stamped with the current time.
    pub fn record(&mut self, sample: &Sample2D) -> Result<&LogRecord> {
        let values = sample.validate()?;
        let [expected_length, measured_length, expected_width, measured_width] = values;
        let errors = calculate_2d_error(expected_length, measured_length, expected_width, measured_width);
        self.append(LogRecord::now(values, &errors));
        let last = self.records.len() - 1;
        Ok(&self.records[last])
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records appended since the last successful flush.
    pub fn pending(&self) -> usize {
        self.records.len() - self.persisted
    }

    /// Persist the whole log to a new timestamped file.
    ///
    /// Returns `Ok(None)` without touching the file system when nothing was
    /// appended since the last successful flush. On error the log is unchanged.
    pub fn flush(&mut self) -> Result<Option<PathBuf>> {
        if self.pending() == 0 {
            return Ok(None);
        }

        storage::ensure_dir(&self.log_dir)?;
        let stem = format!(
            "{LOG_FILE_PREFIX}{}",
            Local::now().format("%Y-%m-%d_%H%M%S")
        );
        let path = storage::unique_path(&self.log_dir, &stem, LOG_FILE_EXTENSION);
        storage::write_log(&path, &self.records)?;

        self.persisted = self.records.len();
        Ok(Some(path))
    }

    /// [`flush`](Self::flush), reporting the outcome as diagnostics.
    ///
    /// Returns the written file, if any.
    pub fn persist(&mut self) -> Option<PathBuf> {
        match self.flush() {
            Ok(Some(path)) => {
                info!(
                    records = self.records.len(),
                    path = %path.display(),
                    "Saved measurement records"
                );
                Some(path)
            }
            Ok(None) => {
                info!("No error data to save");
                None
            }
            Err(e) => {
                error!(
                    pending = self.pending(),
                    dir = %self.log_dir.display(),
                    "SAVE FAILED: {}",
                    e
                );
                None
            }
        }
    }

    /// `true` only when a file was written.
    pub fn save_log(&mut self) -> bool {
        self.persist().is_some()
    }

    /// Final flush. Same result as [`save_log`](Self::save_log).
    pub fn close(mut self) -> bool {
        self.save_log()
    }
}

impl Drop for MeasurementLog {
    fn drop(&mut self) {
        if self.pending() > 0 {
            warn!(pending = self.pending(), "Measurement log dropped with unsaved records");
            self.save_log();
        }
    }
}

impl std::fmt::Debug for MeasurementLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementLog")
            .field("log_dir", &self.log_dir)
            .field("records", &self.records.len())
            .field("persisted", &self.persisted)
            .finish()
    }
}

/// An [`ErrorOverlay`] that records every 2D error box it draws.
pub struct LoggedOverlay<'a, R> {
    inner: R,
    log: &'a mut MeasurementLog,
}

impl<'a, R: ErrorOverlay> LoggedOverlay<'a, R> {
    pub fn new(inner: R, log: &'a mut MeasurementLog) -> Self {
        Self { inner, log }
    }

    pub fn log(&self) -> &MeasurementLog {
        &*self.log
    }
}

impl<R: ErrorOverlay> ErrorOverlay for LoggedOverlay<'_, R> {
    fn draw_error_box(&mut self, frame: &mut dyn Canvas, origin: Point, expected: f64, measured: f64) {
        self.inner.draw_error_box(frame, origin, expected, measured);
    }

    fn draw_2d_error_box(
        &mut self,
        frame: &mut dyn Canvas,
        origin: Point,
        sample: &Sample2D,
        labels: &Labels,
    ) {
        self.inner.draw_2d_error_box(frame, origin, sample, labels);

        let logged = self.log.record(sample).map(|_| ());
        match logged {
            Ok(()) => debug!("Measurement logged: {} records total", self.log.len()),
            Err(e) => warn!("LOG ERROR: {}", e),
        }
    }
}
