//! Record log writer
//!
//! The log file is never held open across frames. Each append opens the file,
//! writes a single row, flushes and syncs it, then releases the handle, so an
//! abnormal exit loses at most the window being accumulated.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::benchmark::AggregatedRecord;
use crate::error::RecordLogError;

use super::{header, RECORD_FIELDS};

#[derive(Debug, Clone)]
pub struct RecordLogWriter {
    path: PathBuf,
}

impl RecordLogWriter {
    /// Truncate (or create) the log at `path` and write the header row.
    pub fn create(path: impl AsRef<Path>, workload_label: &str) -> Result<Self, RecordLogError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| RecordLogError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = File::create(&path).map_err(|source| RecordLogError::Io {
            path: path.clone(),
            source,
        })?;
        write_row(&path, file, &header(workload_label))?;

        Ok(Self { path })
    }

    /// Append one record and make it durable before returning.
    pub fn append(&self, record: &AggregatedRecord) -> Result<(), RecordLogError> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|source| RecordLogError::Io {
                path: self.path.clone(),
                source,
            })?;
        write_row(&self.path, file, &record_fields(record))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Full-precision text form of a record; `f64` `Display` round-trips exactly.
pub fn record_fields(record: &AggregatedRecord) -> [String; RECORD_FIELDS] {
    [
        record.elapsed_secs.to_string(),
        record.stage.to_string(),
        record.workload_size.to_string(),
        record.avg_fps.to_string(),
        record.min_fps.to_string(),
    ]
}

fn write_row(path: &Path, file: File, fields: &[String]) -> Result<(), RecordLogError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(file);

    writer
        .write_record(fields)
        .map_err(|source| RecordLogError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    writer.flush().map_err(|source| RecordLogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    writer
        .get_ref()
        .sync_data()
        .map_err(|source| RecordLogError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> AggregatedRecord {
        AggregatedRecord {
            elapsed_secs: 12.503_421_7,
            stage: 2,
            workload_size: 16_000,
            avg_fps: 143.289_117_3,
            min_fps: 61.002_004_9,
        }
    }

    #[test]
    fn create_writes_header_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("butterfly.csv");
        RecordLogWriter::create(&path, "Particles").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Time (s),Stage,Particles,Avg FPS,Min FPS\n");
    }

    #[test]
    fn each_append_is_visible_immediately() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("triangles.csv");
        let writer = RecordLogWriter::create(&path, "Points").unwrap();

        writer.append(&sample()).unwrap();
        let after_one = fs::read_to_string(&path).unwrap();
        assert_eq!(after_one.lines().count(), 2);

        writer.append(&sample()).unwrap();
        let after_two = fs::read_to_string(&path).unwrap();
        assert_eq!(after_two.lines().count(), 3);
        assert!(after_two
            .lines()
            .nth(1)
            .unwrap()
            .starts_with("12.5034217,2,16000,"));
    }

    #[test]
    fn create_truncates_previous_run() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ocean.csv");
        let writer = RecordLogWriter::create(&path, "Detail").unwrap();
        writer.append(&sample()).unwrap();

        RecordLogWriter::create(&path, "Detail").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn append_to_missing_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.csv");
        let writer = RecordLogWriter::create(&path, "Points").unwrap();
        fs::remove_file(&path).unwrap();

        let err = writer.append(&sample()).unwrap_err();
        assert!(matches!(err, RecordLogError::Io { .. }));
    }
}
