//! Offline analysis of persisted measurement logs.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{error, info};

use crate::chart;
use crate::error::{MeasureLogError, Result};
use crate::models::LogRecord;
use crate::storage;

pub const CHART_PREFIX: &str = "analysis_";
pub const CHART_EXTENSION: &str = "svg";

/// Aggregate relative errors (%) of one log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorSummary {
    pub records: usize,
    pub avg_length_error: f64,
    pub avg_width_error: f64,
    pub avg_mean_error: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub file: PathBuf,
    pub summary: ErrorSummary,
    pub chart: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    /// Where the chart goes; the log file's directory when `None`
    pub out_dir: Option<PathBuf>,
    pub bins: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            out_dir: None,
            bins: 10,
        }
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len() as f64;
    values.sum::<f64>() / n
}

pub fn summarize(records: &[LogRecord]) -> Result<ErrorSummary> {
    if records.is_empty() {
        return Err(MeasureLogError::EmptyLog);
    }
    Ok(ErrorSummary {
        records: records.len(),
        avg_length_error: mean(records.iter().map(|r| r.length_error_rel)),
        avg_width_error: mean(records.iter().map(|r| r.width_error_rel)),
        avg_mean_error: mean(records.iter().map(|r| r.mean_error)),
    })
}

/// Persisted logs in `log_dir`, oldest first; empty (with a diagnostic) when
/// there are none or the directory cannot be read.
pub fn list_measurement_files(log_dir: &Path) -> Vec<PathBuf> {
    match storage::list_log_files(log_dir) {
        Ok(files) if files.is_empty() => {
            info!(
                "No measurement log files found in '{}' directory.",
                log_dir.display()
            );
            files
        }
        Ok(files) => {
            info!("Found {} measurement log files", files.len());
            files
        }
        Err(e) => {
            error!("Error listing files: {}", e);
            vec![]
        }
    }
}

/// Load `path`, compute its summary and write the analysis chart.
pub fn analyze(path: &Path, options: &AnalysisOptions) -> Result<AnalysisReport> {
    let records = storage::read_log(path)?;
    let summary = summarize(&records)?;
    info!(
        file = %path.display(),
        total = summary.records,
        "Average length error: {:.2}%, width error: {:.2}%, mean error: {:.2}%",
        summary.avg_length_error,
        summary.avg_width_error,
        summary.avg_mean_error
    );

    let out_dir = match &options.out_dir {
        Some(dir) => dir.clone(),
        None => path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    storage::ensure_dir(&out_dir)?;
    let stem = format!("{CHART_PREFIX}{}", Local::now().format("%Y%m%d_%H%M%S"));
    let chart_path = storage::unique_path(&out_dir, &stem, CHART_EXTENSION);
    chart::render_analysis_chart(&records, &chart_path, options.bins)?;
    info!(path = %chart_path.display(), "Analysis plots saved");

    Ok(AnalysisReport {
        file: path.to_path_buf(),
        summary,
        chart: chart_path,
    })
}

/// [`analyze`] with default options, reporting failures as diagnostics.
pub fn analyze_measurements(path: &Path) -> bool {
    match analyze(path, &AnalysisOptions::default()) {
        Ok(_) => true,
        Err(e) => {
            error!(file = %path.display(), "Analysis error: {}", e);
            false
        }
    }
}
