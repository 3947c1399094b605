//! measurelog-core: measurement error overlay and logging engine.
//!
//! Every frame gets an on-image error panel comparing expected and measured
//! dimensions. Wrapping the renderer in a [`LoggedOverlay`] records each 2D
//! measurement without changing what is drawn; the log is persisted as a
//! Parquet file once per session and analysed offline.

pub mod analyzer;
pub mod calculator;
pub mod canvas;
pub mod chart;
pub mod error;
pub mod logger;
pub mod models;
pub mod overlay;
pub mod session;
pub mod storage;

pub use analyzer::{analyze, analyze_measurements, list_measurement_files, AnalysisOptions, AnalysisReport, ErrorSummary};
pub use calculator::{calculate_2d_error, calculate_error};
pub use canvas::{Canvas, Color, Frame, Point};
pub use error::MeasureLogError;
pub use logger::{LoggedOverlay, MeasurementLog};
pub use models::{
    ErrorMetrics, Labels, LogRecord, MeasureConfig, Measurement2DErrors, Reading, Sample2D, Severity,
};
pub use overlay::{ErrorBoxRenderer, ErrorOverlay};
pub use session::{MeasurementSession, SessionOutcome, ShutdownSignal};
