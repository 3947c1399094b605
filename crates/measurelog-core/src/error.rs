//! Error types for measurelog-core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeasureLogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    /// Non-numeric or non-finite measurement values reached the 2D renderer.
    #[error("Invalid measurement values: {0}")]
    InvalidInput(String),

    /// A drawing primitive refused an operation.
    #[error("Render error: {0}")]
    Render(String),

    /// A persisted log is missing a column or has the wrong column type.
    #[error("Malformed measurement log: {0}")]
    Schema(String),

    #[error("Measurement log contains no records")]
    EmptyLog,

    #[error("Chart error: {0}")]
    Chart(String),
}

impl<E> From<plotters::drawing::DrawingAreaErrorKind<E>> for MeasureLogError
where
    E: std::error::Error + Send + Sync,
{
    fn from(err: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        MeasureLogError::Chart(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MeasureLogError>;
