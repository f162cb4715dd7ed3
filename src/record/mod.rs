//! Record log module
//!
//! One comma-separated log per test:
//!   Time (s),Stage,<WorkloadLabel>,Avg FPS,Min FPS
//! followed by one row per sampling window. The runner appends to it; the
//! scoring engine reads it back. The column order is a compatibility contract
//! between the two.

mod reader;
mod writer;

pub use reader::{read_record_log, ParsedLog};
pub use writer::RecordLogWriter;

/// Number of columns in every data row.
pub const RECORD_FIELDS: usize = 5;

pub fn header(workload_label: &str) -> [String; RECORD_FIELDS] {
    [
        "Time (s)".to_string(),
        "Stage".to_string(),
        workload_label.to_string(),
        "Avg FPS".to_string(),
        "Min FPS".to_string(),
    ]
}
