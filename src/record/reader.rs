//! Record log reader
//!
//! The first row is always treated as the header. Rows with missing or
//! unparseable fields are skipped and counted; one bad row does not invalidate
//! the rest of the log.

use csv::StringRecord;
use std::fs::File;
use std::path::Path;
use tracing::warn;

use crate::benchmark::AggregatedRecord;
use crate::error::RecordLogError;

use super::RECORD_FIELDS;

/// Contents of one record log after header removal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLog {
    /// Header row, if the file had any rows at all
    pub header: Option<Vec<String>>,
    /// Valid data rows in file order
    pub records: Vec<AggregatedRecord>,
    /// Data rows dropped as malformed
    pub skipped_rows: usize,
}

impl ParsedLog {
    /// Data rows seen after the header, valid or not.
    pub fn data_rows(&self) -> usize {
        self.records.len() + self.skipped_rows
    }
}

pub fn read_record_log(path: impl AsRef<Path>) -> Result<ParsedLog, RecordLogError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| RecordLogError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut parsed = ParsedLog::default();

    for (row_index, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(err) if matches!(err.kind(), csv::ErrorKind::Io(_)) => {
                return Err(RecordLogError::Csv {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
            Err(err) => {
                if row_index > 0 {
                    warn!(path = %path.display(), row = row_index, "Skipping unreadable row: {err}");
                    parsed.skipped_rows += 1;
                }
                continue;
            }
        };

        if row_index == 0 {
            parsed.header = Some(row.iter().map(str::to_string).collect());
            continue;
        }

        match parse_row(&row) {
            Some(record) => parsed.records.push(record),
            None => {
                warn!(
                    path = %path.display(),
                    row = row_index,
                    fields = row.len(),
                    "Skipping malformed record row"
                );
                parsed.skipped_rows += 1;
            }
        }
    }

    Ok(parsed)
}

fn parse_row(row: &StringRecord) -> Option<AggregatedRecord> {
    if row.len() < RECORD_FIELDS {
        return None;
    }

    let elapsed_secs = parse_finite(row.get(0)?)?;
    let stage = parse_count(row.get(1)?)?;
    let workload_size = parse_count(row.get(2)?)?;
    let avg_fps = parse_finite(row.get(3)?)?;
    let min_fps = parse_finite(row.get(4)?)?;

    Some(AggregatedRecord {
        elapsed_secs,
        stage: u32::try_from(stage).ok()?,
        workload_size,
        avg_fps,
        min_fps,
    })
}

fn parse_finite(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Integer column; tolerates a float spelling such as `8000.0`.
fn parse_count(value: &str) -> Option<u64> {
    if let Ok(count) = value.parse::<u64>() {
        return Some(count);
    }
    let float = parse_finite(value)?;
    if float < 0.0 || float.fract() != 0.0 || float > u64::MAX as f64 {
        return None;
    }
    Some(float as u64)
}
