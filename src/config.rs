//! Configuration management for gpu-bench
//!
//! Config file location:
//! - Linux: ~/.config/gpu-bench/config.toml
//! - macOS: ~/Library/Application Support/gpu-bench/config.toml
//! - Windows: %APPDATA%/gpu-bench/config.toml
//!
//! You can override the config location by setting `GPU_BENCH_CONFIG_PATH`.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// Sampling window length used by every test unless overridden.
pub const DEFAULT_WINDOW_INTERVAL_SECS: f64 = 0.5;

/// The fixed set of tests making up one benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Butterfly,
    Triangles,
    Ocean,
}

/// Highest ocean detail level; the grid side doubles with every level.
pub const MAX_OCEAN_DETAIL: u64 = 8;

impl TestKind {
    /// Run order of the suite.
    pub const ALL: [TestKind; 3] = [TestKind::Butterfly, TestKind::Triangles, TestKind::Ocean];

    pub fn name(&self) -> &'static str {
        match self {
            TestKind::Butterfly => "butterfly",
            TestKind::Triangles => "triangles",
            TestKind::Ocean => "ocean",
        }
    }

    /// Column label used for the workload size in the record log header.
    pub fn workload_label(&self) -> &'static str {
        match self {
            TestKind::Butterfly => "Particles",
            TestKind::Triangles => "Points",
            TestKind::Ocean => "Detail",
        }
    }

    /// Largest workload a stage may request, if the test has a limit.
    pub fn max_workload(&self) -> Option<u64> {
        match self {
            TestKind::Ocean => Some(MAX_OCEAN_DETAIL),
            TestKind::Butterfly | TestKind::Triangles => None,
        }
    }

    pub fn log_file_name(&self) -> String {
        format!("{}.csv", self.name())
    }

    pub fn default_schedule(&self) -> Vec<u64> {
        match self {
            TestKind::Butterfly => (0..12).map(|k| 8_000u64 << k).collect(),
            TestKind::Triangles => vec![10_000, 50_000, 100_000, 500_000, 1_000_000, 10_000_000],
            TestKind::Ocean => vec![1, 2, 3, 4, 5, 6],
        }
    }

    pub fn default_stage_duration_secs(&self) -> f64 {
        10.0
    }

    pub fn default_test_duration_secs(&self) -> f64 {
        match self {
            TestKind::Butterfly => 120.0,
            TestKind::Triangles | TestKind::Ocean => 60.0,
        }
    }

    pub fn default_warm_up_secs(&self) -> f64 {
        match self {
            TestKind::Butterfly | TestKind::Ocean => 2.0,
            TestKind::Triangles => 0.0,
        }
    }

    /// Rescales `fps x workload` into a range comparable with the other tests.
    pub fn normalize_factor(&self) -> f64 {
        match self {
            TestKind::Butterfly => 16_384_000.0,
            TestKind::Triangles => 10_000_000.0,
            TestKind::Ocean => 6.0,
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TestKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "butterfly" => Ok(TestKind::Butterfly),
            "triangles" => Ok(TestKind::Triangles),
            "ocean" => Ok(TestKind::Ocean),
            other => Err(ConfigError::UnknownTest(other.to_string())),
        }
    }
}

/// Fully resolved, validated parameters for one test run.
#[derive(Debug, Clone, PartialEq)]
pub struct TestConfig {
    pub kind: TestKind,
    pub workload_schedule: Vec<u64>,
    pub stage_duration_secs: f64,
    pub test_duration_secs: f64,
    pub warm_up_secs: f64,
    pub window_interval_secs: f64,
    pub normalize_factor: f64,
}

impl TestConfig {
    /// Built-in parameters for `kind`.
    pub fn defaults(kind: TestKind) -> Self {
        TestConfig {
            kind,
            workload_schedule: kind.default_schedule(),
            stage_duration_secs: kind.default_stage_duration_secs(),
            test_duration_secs: kind.default_test_duration_secs(),
            warm_up_secs: kind.default_warm_up_secs(),
            window_interval_secs: DEFAULT_WINDOW_INTERVAL_SECS,
            normalize_factor: kind.normalize_factor(),
        }
    }

    /// Apply file overrides on top of the defaults and validate the result.
    pub fn resolve(kind: TestKind, overrides: &TestOverrides) -> Result<Self, ConfigError> {
        let mut config = Self::defaults(kind);
        if let Some(schedule) = &overrides.workload_schedule {
            config.workload_schedule = schedule.clone();
        }
        if let Some(value) = overrides.stage_duration_seconds {
            config.stage_duration_secs = value;
        }
        if let Some(value) = overrides.test_duration_seconds {
            config.test_duration_secs = value;
        }
        if let Some(value) = overrides.warm_up_seconds {
            config.warm_up_secs = value;
        }
        if let Some(value) = overrides.window_interval_seconds {
            config.window_interval_secs = value;
        }
        if let Some(value) = overrides.normalize_factor {
            config.normalize_factor = value;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let test = self.kind.name().to_string();

        if self.workload_schedule.is_empty() {
            return Err(ConfigError::EmptySchedule { test });
        }
        if self.workload_schedule.contains(&0) {
            return Err(ConfigError::NonPositiveWorkload { test });
        }
        if let Some(max) = self.kind.max_workload() {
            if let Some(&value) = self.workload_schedule.iter().find(|&&size| size > max) {
                return Err(ConfigError::WorkloadTooLarge { test, value, max });
            }
        }

        let positive = [
            ("stage_duration_seconds", self.stage_duration_secs),
            ("test_duration_seconds", self.test_duration_secs),
            ("window_interval_seconds", self.window_interval_secs),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidDuration { test, field, value });
            }
        }
        if !self.warm_up_secs.is_finite() || self.warm_up_secs < 0.0 {
            return Err(ConfigError::InvalidDuration {
                test,
                field: "warm_up_seconds",
                value: self.warm_up_secs,
            });
        }

        if !self.normalize_factor.is_finite() || self.normalize_factor <= 0.0 {
            return Err(ConfigError::InvalidNormalizeFactor {
                test,
                value: self.normalize_factor,
            });
        }

        Ok(())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Record log location and render target size
    #[serde(default)]
    pub output: OutputConfig,

    /// Per-test parameter overrides
    #[serde(default)]
    pub tests: TestsConfig,

    /// Total score policy
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Result submission endpoint
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from file or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

            let config: Config = toml::from_str(&content).with_context(|| {
                format!("Failed to parse config from {}", config_path.display())
            })?;

            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, toml)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("GPU_BENCH_CONFIG_PATH") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed));
            }
        }

        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Create default config file if it doesn't exist
    pub fn init() -> Result<Self> {
        let config = Self::load()?;

        let config_path = Self::config_path()?;
        if !config_path.exists() {
            config.save()?;
        }

        Ok(config)
    }

    /// Resolved parameters for one test.
    pub fn test_config(&self, kind: TestKind) -> Result<TestConfig, ConfigError> {
        TestConfig::resolve(kind, self.tests.overrides(kind))
    }

    /// Directory holding the per-test record logs.
    pub fn results_dir(&self) -> Result<PathBuf> {
        match self.output.results_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
            _ => Ok(data_dir()?.join("tests")),
        }
    }

    pub fn record_log_path(&self, kind: TestKind) -> Result<PathBuf> {
        Ok(self.results_dir()?.join(kind.log_file_name()))
    }
}

/// Local data directory (record logs, saved results).
pub fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "gpubench", "gpu-bench")
        .context("Could not determine project directories")
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for `<test>.csv` record logs (defaults to the data directory)
    pub results_dir: Option<String>,

    /// Render target width in pixels
    #[serde(default = "default_window_width")]
    pub window_width: u32,

    /// Render target height in pixels
    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: None,
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

fn default_window_width() -> u32 {
    1024
}

fn default_window_height() -> u32 {
    768
}

/// Optional per-test overrides; unset fields keep the built-in value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload_schedule: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warm_up_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_interval_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalize_factor: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestsConfig {
    #[serde(default)]
    pub butterfly: TestOverrides,
    #[serde(default)]
    pub triangles: TestOverrides,
    #[serde(default)]
    pub ocean: TestOverrides,
}

impl TestsConfig {
    pub fn overrides(&self, kind: TestKind) -> &TestOverrides {
        match kind {
            TestKind::Butterfly => &self.butterfly,
            TestKind::Triangles => &self.triangles,
            TestKind::Ocean => &self.ocean,
        }
    }
}

/// Scoring policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Report a partial total when some tests have no usable record log.
    #[serde(default)]
    pub allow_partial: bool,
}

/// Submission endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Submit results after a suite run
    #[serde(default)]
    pub enabled: bool,

    /// API base URL
    #[serde(default)]
    pub base_url: String,

    /// Table receiving result rows
    #[serde(default = "default_table")]
    pub table: String,

    /// API key sent in the `apikey` header
    pub api_key: Option<String>,

    /// API timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of retry attempts for transient network errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            table: default_table(),
            api_key: None,
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_table() -> String {
    "benchmark_results".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

/// Get configuration file path for display purposes
pub fn get_config_path() -> Result<String> {
    let path = Config::config_path()?;
    Ok(path.display().to_string())
}
