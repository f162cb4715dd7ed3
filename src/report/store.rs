//! Local result storage
//!
//! Every assembled result is written here before any submission attempt, so a
//! failed upload never loses a run. Files live in `<data dir>/results/` and are
//! named `<UTC timestamp>_<id>.json`.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::BenchmarkResult;
use crate::config;

/// Default directory for saved results.
pub fn default_results_dir() -> Result<PathBuf> {
    Ok(config::data_dir()?.join("results"))
}

pub fn file_name(result: &BenchmarkResult) -> String {
    format!(
        "{}_{}.json",
        result.created_at().format("%Y%m%dT%H%M%SZ"),
        result.id().simple()
    )
}

/// Write `result` as pretty JSON into `dir` and return the file path.
pub fn save_result(result: &BenchmarkResult, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create results directory: {}", dir.display()))?;

    let path = dir.join(file_name(result));
    let json = serde_json::to_string_pretty(result).context("Failed to serialize benchmark result")?;

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("Failed to create result file at {}", path.display()))?;
    file.write_all(json.as_bytes())
        .with_context(|| format!("Failed to write result to {}", path.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync result file {}", path.display()))?;

    Ok(path)
}
