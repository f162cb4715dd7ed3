//! Scoring engine
//!
//! Per test: `((mean(avg_fps) * 0.7 + mean(min_fps) * 0.3) * mean(workload)) / normalize_factor`,
//! with unweighted means over the valid rows of the record log. The total is
//! the sum over the fixed test set. The CLI score command and the report path
//! both go through this module.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::{TestConfig, TestKind};
use crate::error::ScoreError;
use crate::record::{read_record_log, ParsedLog};

/// Weight of sustained throughput in the blended FPS.
pub const AVG_FPS_WEIGHT: f64 = 0.7;
/// Weight of worst-frame FPS in the blended FPS.
pub const MIN_FPS_WEIGHT: f64 = 0.3;

/// Score of one test plus the means it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestScore {
    pub test: TestKind,
    pub value: f64,
    pub mean_avg_fps: f64,
    pub mean_min_fps: f64,
    pub mean_workload: f64,
    /// Number of sampling windows that contributed
    pub windows: usize,
}

/// What to do when some tests cannot be scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TotalPolicy {
    /// Fail with `IncompleteSuite` unless every test has a score.
    #[default]
    RequireAll,
    /// Sum whatever is available and report the rest as missing.
    Partial,
}

impl TotalPolicy {
    pub fn from_allow_partial(allow_partial: bool) -> Self {
        if allow_partial {
            TotalPolicy::Partial
        } else {
            TotalPolicy::RequireAll
        }
    }
}

/// Compute the score for `test` from an already parsed log.
pub fn score(test: TestKind, log: &ParsedLog, normalize_factor: f64) -> Result<TestScore, ScoreError> {
    if log.records.is_empty() {
        let reason = if log.header.is_none() {
            "record log is empty".to_string()
        } else if log.skipped_rows > 0 {
            format!("no valid data rows ({} malformed)", log.skipped_rows)
        } else {
            "record log has no data rows".to_string()
        };
        return Err(ScoreError::InsufficientData {
            test: test.name().to_string(),
            reason,
        });
    }

    let windows = log.records.len();
    let count = windows as f64;
    let (avg_sum, min_sum, load_sum) = log.records.iter().fold((0.0f64, 0.0f64, 0.0f64), |acc, r| {
        (acc.0 + r.avg_fps, acc.1 + r.min_fps, acc.2 + r.workload_size as f64)
    });

    let mean_avg_fps = avg_sum / count;
    let mean_min_fps = min_sum / count;
    let mean_workload = load_sum / count;
    let value =
        ((mean_avg_fps * AVG_FPS_WEIGHT + mean_min_fps * MIN_FPS_WEIGHT) * mean_workload) / normalize_factor;

    debug!(
        test = %test,
        windows,
        rows = log.data_rows(),
        value,
        "Computed test score"
    );

    Ok(TestScore {
        test,
        value,
        mean_avg_fps,
        mean_min_fps,
        mean_workload,
        windows,
    })
}

/// A scored test together with the log it was scored from.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredLog {
    pub score: TestScore,
    pub log: ParsedLog,
}

/// Read and score one record log. An unreadable log is insufficient data.
pub fn score_log(test: &TestConfig, path: &Path) -> Result<ScoredLog, ScoreError> {
    let log = read_record_log(path).map_err(|err| ScoreError::InsufficientData {
        test: test.kind.name().to_string(),
        reason: err.to_string(),
    })?;
    let score = score(test.kind, &log, test.normalize_factor)?;
    Ok(ScoredLog { score, log })
}

/// One test's input to suite scoring.
#[derive(Debug, Clone)]
pub struct SuiteInput {
    pub test: TestConfig,
    pub log_path: PathBuf,
    /// Set when this run of the test did not complete. The log on disk may
    /// then belong to an earlier run and is not scored.
    pub run_failure: Option<String>,
}

impl SuiteInput {
    pub fn new(test: TestConfig, log_path: PathBuf) -> Self {
        Self {
            test,
            log_path,
            run_failure: None,
        }
    }
}

#[derive(Debug)]
pub struct SuiteScores {
    /// Scored tests in suite order
    pub tests: Vec<ScoredLog>,
    pub total_score: f64,
    pub missing: Vec<TestKind>,
    /// Why each missing test could not be scored
    pub failures: Vec<ScoreError>,
}

impl SuiteScores {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn get(&self, test: TestKind) -> Option<&ScoredLog> {
        self.tests.iter().find(|scored| scored.score.test == test)
    }
}

/// Score every input and combine them according to `policy`.
pub fn score_suite(inputs: &[SuiteInput], policy: TotalPolicy) -> Result<SuiteScores, ScoreError> {
    let mut tests = Vec::with_capacity(inputs.len());
    let mut missing = Vec::new();
    let mut failures = Vec::new();

    for input in inputs {
        let scored = match &input.run_failure {
            Some(reason) => Err(ScoreError::RunFailed {
                test: input.test.kind.name().to_string(),
                reason: reason.clone(),
            }),
            None => score_log(&input.test, &input.log_path),
        };
        match scored {
            Ok(scored) => tests.push(scored),
            Err(err) => {
                warn!(test = %input.test.kind, "Cannot score test: {}", err);
                missing.push(input.test.kind);
                failures.push(err);
            }
        }
    }

    if !missing.is_empty() && policy == TotalPolicy::RequireAll {
        return Err(ScoreError::IncompleteSuite {
            missing: missing.iter().map(|kind| kind.name().to_string()).collect(),
            failures,
        });
    }

    let total_score = tests.iter().map(|scored| scored.score.value).sum();

    Ok(SuiteScores {
        tests,
        total_score,
        missing,
        failures,
    })
}
