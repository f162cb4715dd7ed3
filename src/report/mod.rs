//! Result assembly and reporting
//!
//! [`ResultAssembler`] packages the suite scores, the per-test FPS history and
//! the hardware metadata into one immutable [`BenchmarkResult`]. The result is
//! then handed by value to the reporting collaborators: [`store`] keeps a local
//! copy and [`submit`] posts it to the results endpoint.

pub mod store;
pub mod submit;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::TestKind;
use crate::scoring::{ScoredLog, SuiteScores};

/// Environment description supplied by the caller. Treated as opaque here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareMetadata {
    pub gpu_name: String,
    pub vram_mb: Option<u64>,
    pub driver_version: Option<String>,
    pub cpu_name: String,
    pub ram_mb: Option<u64>,
    pub os_version: String,
    pub uses_wine: bool,
}

/// One point of an FPS time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FpsEntry {
    /// Seconds since the start of the measured run
    pub time: f64,
    pub fps: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedScore {
    pub test_name: String,
    pub value: f64,
}

/// Per-test summary and history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub test: TestKind,
    pub score: f64,
    /// Mean of the per-window average FPS
    pub avg_fps: f64,
    /// Mean of the per-window minimum FPS
    pub min_fps: f64,
    pub avg_history: Vec<FpsEntry>,
    pub min_history: Vec<FpsEntry>,
}

impl TestReport {
    fn from_scored(scored: &ScoredLog) -> Self {
        let records = &scored.log.records;
        Self {
            test: scored.score.test,
            score: scored.score.value,
            avg_fps: scored.score.mean_avg_fps,
            min_fps: scored.score.mean_min_fps,
            avg_history: records
                .iter()
                .map(|r| FpsEntry {
                    time: r.elapsed_secs,
                    fps: r.avg_fps,
                })
                .collect(),
            min_history: records
                .iter()
                .map(|r| FpsEntry {
                    time: r.elapsed_secs,
                    fps: r.min_fps,
                })
                .collect(),
        }
    }
}

/// Final benchmark result. Built once by [`ResultAssembler`]; read-only after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    id: Uuid,
    created_at: DateTime<Utc>,
    scores: Vec<NormalizedScore>,
    total_score: f64,
    complete: bool,
    missing_tests: Vec<TestKind>,
    tests: Vec<TestReport>,
    metadata: HardwareMetadata,
}

impl BenchmarkResult {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn scores(&self) -> &[NormalizedScore] {
        &self.scores
    }

    pub fn total_score(&self) -> f64 {
        self.total_score
    }

    /// `false` when the total was computed without every test.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn missing_tests(&self) -> &[TestKind] {
        &self.missing_tests
    }

    pub fn tests(&self) -> &[TestReport] {
        &self.tests
    }

    pub fn test(&self, kind: TestKind) -> Option<&TestReport> {
        self.tests().iter().find(|t| t.test == kind)
    }

    pub fn metadata(&self) -> &HardwareMetadata {
        &self.metadata
    }
}

impl fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<12} {:>12} {:>10} {:>10} {:>8}",
            "Test", "Score", "Avg FPS", "Min FPS", "Windows"
        )?;
        writeln!(f, "{}", "-".repeat(56))?;
        for kind in TestKind::ALL {
            match self.test(kind) {
                Some(t) => writeln!(
                    f,
                    "{:<12} {:>12.4} {:>10.1} {:>10.1} {:>8}",
                    kind.name(),
                    t.score,
                    t.avg_fps,
                    t.min_fps,
                    t.avg_history.len()
                )?,
                None => writeln!(f, "{:<12} {:>12}", kind.name(), "missing")?,
            }
        }
        writeln!(f, "{}", "-".repeat(56))?;
        write!(f, "{:<12} {:>12.4}", "Total", self.total_score)?;
        if !self.is_complete() {
            let missing: Vec<&str> = self.missing_tests().iter().map(|t| t.name()).collect();
            write!(f, "  (partial, missing: {})", missing.join(", "))?;
        }
        Ok(())
    }
}

/// Builds a [`BenchmarkResult`] from scored tests and hardware metadata.
#[derive(Debug, Clone)]
pub struct ResultAssembler {
    id: Uuid,
    created_at: DateTime<Utc>,
}

impl Default for ResultAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultAssembler {
    /// Fresh random id, stamped now.
    pub fn new() -> Self {
        Self::with_identity(Uuid::new_v4(), Utc::now())
    }

    pub fn with_identity(id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self { id, created_at }
    }

    pub fn assemble(self, suite: &SuiteScores, metadata: HardwareMetadata) -> BenchmarkResult {
        let scores = suite
            .tests
            .iter()
            .map(|scored| NormalizedScore {
                test_name: scored.score.test.name().to_string(),
                value: scored.score.value,
            })
            .collect();

        BenchmarkResult {
            id: self.id,
            created_at: self.created_at,
            scores,
            total_score: suite.total_score,
            complete: suite.is_complete(),
            missing_tests: suite.missing.clone(),
            tests: suite.tests.iter().map(TestReport::from_scored).collect(),
            metadata,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::benchmark::AggregatedRecord;
    use crate::record::ParsedLog;
    use crate::scoring::score;

    pub(crate) fn metadata() -> HardwareMetadata {
        HardwareMetadata {
            gpu_name: "NVIDIA GeForce RTX 3070".to_string(),
            vram_mb: Some(8192),
            driver_version: Some("550.54.14".to_string()),
            cpu_name: "AMD Ryzen 7 5800X".to_string(),
            ram_mb: Some(32_768),
            os_version: "Ubuntu 24.04".to_string(),
            uses_wine: false,
        }
    }

    fn scored(kind: TestKind, rows: &[(f64, u64, f64, f64)]) -> ScoredLog {
        let log = ParsedLog {
            header: Some(Vec::new()),
            records: rows
                .iter()
                .map(|&(elapsed_secs, workload_size, avg_fps, min_fps)| AggregatedRecord {
                    elapsed_secs,
                    stage: 1,
                    workload_size,
                    avg_fps,
                    min_fps,
                })
                .collect(),
            skipped_rows: 0,
        };
        let score = score(kind, &log, kind.normalize_factor()).unwrap();
        ScoredLog { score, log }
    }

    pub(crate) fn sample_result() -> BenchmarkResult {
        let tests = vec![
            scored(
                TestKind::Butterfly,
                &[(0.5, 8_000, 120.0, 95.0), (1.0, 8_000, 118.0, 90.0)],
            ),
            scored(TestKind::Triangles, &[(0.5, 10_000, 240.0, 180.0)]),
            scored(TestKind::Ocean, &[(0.5, 1, 300.0, 200.0)]),
        ];
        let total_score = tests.iter().map(|t| t.score.value).sum();
        let suite = SuiteScores {
            tests,
            total_score,
            missing: Vec::new(),
            failures: Vec::new(),
        };
        ResultAssembler::new().assemble(&suite, metadata())
    }

    #[test]
    fn assembles_scores_history_and_metadata() {
        let result = sample_result();

        assert!(result.is_complete());
        assert_eq!(result.scores().len(), 3);
        let summed: f64 = result.scores().iter().map(|s| s.value).sum();
        assert!((result.total_score() - summed).abs() < 1e-9);

        let butterfly = result.test(TestKind::Butterfly).unwrap();
        assert_eq!(butterfly.avg_fps, 119.0);
        assert_eq!(butterfly.min_fps, 92.5);
        assert_eq!(
            butterfly.avg_history,
            vec![
                FpsEntry {
                    time: 0.5,
                    fps: 120.0
                },
                FpsEntry {
                    time: 1.0,
                    fps: 118.0
                },
            ]
        );
        assert_eq!(butterfly.min_history[1].fps, 90.0);
        assert_eq!(result.metadata().gpu_name, "NVIDIA GeForce RTX 3070");
    }

    #[test]
    fn partial_result_lists_missing_tests() {
        let suite = SuiteScores {
            tests: vec![scored(TestKind::Ocean, &[(0.5, 2, 100.0, 80.0)])],
            total_score: 0.0,
            missing: vec![TestKind::Butterfly, TestKind::Triangles],
            failures: Vec::new(),
        };
        let result = ResultAssembler::new().assemble(&suite, metadata());

        assert!(!result.is_complete());
        assert_eq!(
            result.missing_tests(),
            &[TestKind::Butterfly, TestKind::Triangles]
        );
        let table = result.to_string();
        assert!(table.contains("missing: butterfly, triangles"));
        assert!(table.lines().any(|l| l.starts_with("triangles") && l.contains("missing")));
    }

    #[test]
    fn fixed_identity_is_kept() {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let suite = SuiteScores {
            tests: Vec::new(),
            total_score: 0.0,
            missing: TestKind::ALL.to_vec(),
            failures: Vec::new(),
        };
        let result = ResultAssembler::with_identity(id, created_at).assemble(&suite, metadata());
        assert_eq!(result.id(), id);
        assert_eq!(result.created_at(), created_at);
    }

    #[test]
    fn serializes_to_json() {
        let result = sample_result();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["complete"], true);
        assert_eq!(json["tests"][0]["test"], "butterfly");
        assert_eq!(json["tests"][0]["avg_history"][0]["time"], 0.5);
        assert_eq!(json["metadata"]["uses_wine"], false);

        let back: BenchmarkResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.id(), result.id());
        assert_eq!(back.missing_tests(), result.missing_tests());
        assert!((back.total_score() - result.total_score()).abs() < 1e-9);
    }
}
