//! Storage layer: Parquet measurement logs, YAML config, file system management.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use tracing::warn;

use crate::error::{MeasureLogError, Result};
use crate::models::{LogRecord, TIMESTAMP_FORMAT};

pub const LOG_FILE_PREFIX: &str = "error_log_";
pub const LOG_FILE_EXTENSION: &str = "parquet";

/// Column names of a persisted log, in file order.
pub const COLUMNS: [&str; 11] = [
    "Timestamp",
    "Expected_Length",
    "Measured_Length",
    "Length_Error_Abs",
    "Length_Error_Rel",
    "Expected_Width",
    "Measured_Width",
    "Width_Error_Abs",
    "Width_Error_Rel",
    "Area_Error_Rel",
    "Mean_Error",
];

// ─── Directory helpers ────────────────────────────────────────────────────────

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// `<dir>/<stem>.<ext>`, or `<dir>/<stem>_<n>.<ext>` for the first free `n`
/// when that file already exists.
pub fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let candidate = dir.join(format!("{stem}.{ext}"));
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| dir.join(format!("{stem}_{n}.{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Persisted measurement logs in `dir`, oldest first.
pub fn list_log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files = vec![];
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(LOG_FILE_PREFIX))
            .unwrap_or(false)
            && path.extension().and_then(|e| e.to_str()) == Some(LOG_FILE_EXTENSION);
        if is_log {
            files.push(path);
        }
    }
    // Names embed the timestamp, so lexical order is chronological.
    files.sort();
    Ok(files)
}

// ─── YAML config I/O ─────────────────────────────────────────────────────────

pub fn save_yaml<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let content = serde_yaml::to_string(data)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T>
where
    T: Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let content = fs::read_to_string(path)?;
    let val = serde_yaml::from_str(&content)?;
    Ok(val)
}

// ─── Parquet log I/O ─────────────────────────────────────────────────────────

fn log_schema() -> Schema {
    let fields = COLUMNS
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let data_type = if i == 0 { DataType::Utf8 } else { DataType::Float64 };
            Field::new(*name, data_type, false)
        })
        .collect::<Vec<_>>();
    Schema::new(fields)
}

fn records_to_batch(records: &[LogRecord]) -> Result<RecordBatch> {
    let column = |f: fn(&LogRecord) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from(records.iter().map(f).collect::<Vec<_>>()))
    };

    let timestamps: Vec<String> = records.iter().map(LogRecord::formatted_timestamp).collect();
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(timestamps)) as ArrayRef,
        column(|r| r.expected_length),
        column(|r| r.measured_length),
        column(|r| r.length_error_abs),
        column(|r| r.length_error_rel),
        column(|r| r.expected_width),
        column(|r| r.measured_width),
        column(|r| r.width_error_abs),
        column(|r| r.width_error_rel),
        column(|r| r.area_error_rel),
        column(|r| r.mean_error),
    ];

    Ok(RecordBatch::try_new(Arc::new(log_schema()), columns)?)
}

/// Write `records` as a single Parquet file, replacing `path` if it exists.
///
/// The file is written under a `.partial` name and renamed into place once
/// complete; on failure nothing is left at either name.
pub fn write_log(path: &Path, records: &[LogRecord]) -> Result<()> {
    let batch = records_to_batch(records)?;
    let partial = partial_path(path);
    let written = write_batch(&partial, &batch).and_then(|()| Ok(fs::rename(&partial, path)?));
    if written.is_err() && partial.exists() {
        if let Err(e) = fs::remove_file(&partial) {
            warn!(path = %partial.display(), "Could not remove partial log: {}", e);
        }
    }
    written
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn write_batch(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = fs::File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Read a persisted log back, in file order.
pub fn read_log(path: &Path) -> Result<Vec<LogRecord>> {
    let file = fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut records = vec![];
    for batch in reader {
        records.extend(batch_to_records(&batch?)?);
    }
    Ok(records)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| MeasureLogError::Schema(format!("missing column {name}")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| MeasureLogError::Schema(format!("column {name} is not text")))
}

fn float_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| MeasureLogError::Schema(format!("missing column {name}")))?
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| MeasureLogError::Schema(format!("column {name} is not Float64")))
}

fn batch_to_records(batch: &RecordBatch) -> Result<Vec<LogRecord>> {
    let timestamps = string_column(batch, COLUMNS[0])?;
    let floats = COLUMNS[1..]
        .iter()
        .map(|name| float_column(batch, name))
        .collect::<Result<Vec<_>>>()?;

    let mut records = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        if timestamps.is_null(row) || floats.iter().any(|col| col.is_null(row)) {
            return Err(MeasureLogError::Schema(format!("null value in row {row}")));
        }
        let value = |col: usize| floats[col].value(row);
        records.push(LogRecord {
            timestamp: NaiveDateTime::parse_from_str(timestamps.value(row), TIMESTAMP_FORMAT)?,
            expected_length: value(0),
            measured_length: value(1),
            length_error_abs: value(2),
            length_error_rel: value(3),
            expected_width: value(4),
            measured_width: value(5),
            width_error_abs: value(6),
            width_error_rel: value(7),
            area_error_rel: value(8),
            mean_error: value(9),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::calculate_2d_error;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn record(second: u32, values: [f64; 4]) -> LogRecord {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(14, 5, second))
            .unwrap();
        let [el, ml, ew, mw] = values;
        LogRecord::at(ts, values, &calculate_2d_error(el, ml, ew, mw))
    }

    #[test]
    fn test_write_then_read_preserves_order_and_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("error_log_test.parquet");
        let records = vec![
            record(1, [50.0, 45.0, 50.0, 48.0]),
            record(2, [145.0, 130.0, 80.0, 75.0]),
            record(3, [0.0, 5.0, 10.0, 10.0]),
        ];

        write_log(&path, &records).unwrap();
        let loaded = read_log(&path).unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_file_schema_column_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("error_log_schema.parquet");
        write_log(&path, &[record(0, [1.0, 1.0, 1.0, 1.0])]).unwrap();

        let file = fs::File::open(&path).unwrap();
        let builder = ParquetRecordBatchReaderBuilder::try_new(file).unwrap();
        let names: Vec<String> = builder
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(names, COLUMNS);

        let batch = builder.build().unwrap().next().unwrap().unwrap();
        let ts = string_column(&batch, "Timestamp").unwrap();
        assert_eq!(ts.value(0), "2024-03-09 14:05:00");
    }

    #[test]
    fn test_read_rejects_foreign_parquet() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("other.parquet");
        let schema = Arc::new(Schema::new(vec![Field::new("loss", DataType::Float64, false)]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(Float64Array::from(vec![0.5])) as ArrayRef],
        )
        .unwrap();
        let mut writer = ArrowWriter::try_new(fs::File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let err = read_log(&path).unwrap_err();
        assert!(matches!(err, MeasureLogError::Schema(_)), "{err}");
    }

    #[test]
    fn test_failed_write_leaves_no_log_behind() {
        let tmp = TempDir::new().unwrap();
        // A directory squatting on the target name makes the final rename fail.
        let path = tmp.path().join("error_log_2024-03-09_140500.parquet");
        fs::create_dir(&path).unwrap();

        assert!(write_log(&path, &[record(0, [1.0, 2.0, 3.0, 4.0])]).is_err());

        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["error_log_2024-03-09_140500.parquet"]);
        assert!(path.is_dir());
        assert!(list_log_files(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("error_log_replace.parquet");
        write_log(&path, &[record(0, [1.0, 1.0, 1.0, 1.0])]).unwrap();
        write_log(&path, &[record(1, [2.0, 2.0, 2.0, 2.0]), record(2, [3.0, 3.0, 3.0, 3.0])]).unwrap();

        assert_eq!(read_log(&path).unwrap().len(), 2);
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_unique_path_never_reuses_a_name() {
        let tmp = TempDir::new().unwrap();
        let first = unique_path(tmp.path(), "error_log_2024-03-09_140500", "parquet");
        assert_eq!(first.file_name().unwrap(), "error_log_2024-03-09_140500.parquet");
        fs::write(&first, b"x").unwrap();

        let second = unique_path(tmp.path(), "error_log_2024-03-09_140500", "parquet");
        assert_eq!(second.file_name().unwrap(), "error_log_2024-03-09_140500_1.parquet");
        fs::write(&second, b"x").unwrap();

        let third = unique_path(tmp.path(), "error_log_2024-03-09_140500", "parquet");
        assert_eq!(third.file_name().unwrap(), "error_log_2024-03-09_140500_2.parquet");
    }

    #[test]
    fn test_list_log_files_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        assert!(list_log_files(&tmp.path().join("missing")).unwrap().is_empty());

        for name in [
            "error_log_2024-03-09_140501.parquet",
            "error_log_2024-03-08_090000.parquet",
            "analysis_20240309_140502.svg",
            "notes.txt",
        ] {
            fs::write(tmp.path().join(name), b"").unwrap();
        }
        fs::create_dir(tmp.path().join("error_log_dir.parquet")).unwrap();

        let files = list_log_files(tmp.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "error_log_2024-03-08_090000.parquet",
                "error_log_2024-03-09_140501.parquet"
            ]
        );
    }
}
