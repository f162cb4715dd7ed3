//! Error taxonomy
//!
//! Render and record-log failures are fatal for a single test but never for the
//! pipeline. Scoring failures are returned to the orchestrator, which decides
//! whether a partial total is acceptable.

use std::path::PathBuf;
use thiserror::Error;

/// Rendering context could not be created.
#[derive(Error, Debug)]
pub enum RenderSetupError {
    #[error("Invalid viewport {width}x{height}")]
    InvalidViewport { width: u32, height: u32 },

    #[error("Failed to allocate {bytes} byte framebuffer")]
    FramebufferAllocation { bytes: usize },
}

/// Failures while writing or reading a per-test record log.
#[derive(Error, Debug)]
pub enum RecordLogError {
    #[error("Record log I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Record log CSV error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// A single test run failed.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Render setup failed: {0}")]
    RenderSetup(#[from] RenderSetupError),

    #[error(transparent)]
    RecordLog(#[from] RecordLogError),
}

/// Score computation failures.
#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("Insufficient data for {test}: {reason}")]
    InsufficientData { test: String, reason: String },

    #[error("{test} did not complete: {reason}")]
    RunFailed { test: String, reason: String },

    #[error("Missing scores for: {}", .missing.join(", "))]
    IncompleteSuite {
        missing: Vec<String>,
        failures: Vec<ScoreError>,
    },
}

/// Invalid test configuration.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Unknown test '{0}' (expected butterfly, triangles or ocean)")]
    UnknownTest(String),

    #[error("{test}: workload schedule must contain at least one entry")]
    EmptySchedule { test: String },

    #[error("{test}: workload sizes must be positive")]
    NonPositiveWorkload { test: String },

    #[error("{test}: {field} must be a positive number of seconds, got {value}")]
    InvalidDuration {
        test: String,
        field: &'static str,
        value: f64,
    },

    #[error("{test}: workload {value} exceeds the maximum of {max}")]
    WorkloadTooLarge { test: String, value: u64, max: u64 },

    #[error("{test}: normalize factor must be positive, got {value}")]
    InvalidNormalizeFactor { test: String, value: f64 },
}
