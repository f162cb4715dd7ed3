//! Result submission
//!
//! Posts one flat row per result to `<base_url>/rest/v1/<table>` with the
//! `apikey` and `Prefer: return=minimal` headers. Connection failures and 5xx
//! responses are retried with exponential backoff; anything else is final.

use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{BenchmarkResult, FpsEntry};
use crate::config::{ApiConfig, TestKind};

/// Submission errors
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Submission is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Server unreachable")]
    Unreachable,
}

/// Row layout of the results table.
#[derive(Debug, Serialize)]
struct SubmissionRow<'a> {
    id: String,
    gpu_name: &'a str,
    vram_size: String,
    driver_version: &'a str,
    os_version: &'a str,
    uses_wine: bool,
    butterfly_score: Option<f64>,
    triangles_score: Option<f64>,
    ocean_score: Option<f64>,
    total_score: f64,
    complete: bool,
    butterfly_avg_fps: Option<f64>,
    butterfly_min_fps: Option<f64>,
    triangles_avg_fps: Option<f64>,
    triangles_min_fps: Option<f64>,
    ocean_avg_fps: Option<f64>,
    ocean_min_fps: Option<f64>,
    butterfly_avg_fps_history: &'a [FpsEntry],
    butterfly_min_fps_history: &'a [FpsEntry],
    triangles_avg_fps_history: &'a [FpsEntry],
    triangles_min_fps_history: &'a [FpsEntry],
    ocean_avg_fps_history: &'a [FpsEntry],
    ocean_min_fps_history: &'a [FpsEntry],
    ram_size: String,
    cpu_name: &'a str,
    created_at: String,
}

pub struct ResultSubmitter {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl ResultSubmitter {
    pub fn from_config(api: &ApiConfig) -> Result<Self, SubmitError> {
        let base_url = normalize_base_url(&api.base_url).ok_or(SubmitError::NotConfigured("api.base_url is empty"))?;
        let table = api.table.trim();
        if table.is_empty() {
            return Err(SubmitError::NotConfigured("api.table is empty"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(api.timeout_seconds.max(1)))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/rest/v1/{}", base_url, table),
            api_key: api
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
            max_retries: api.max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn submit(&self, result: &BenchmarkResult) -> Result<(), SubmitError> {
        let row = to_submission_row(result);
        let max_attempts = self.max_retries.saturating_add(1).max(1);
        debug!(endpoint = self.endpoint(), id = %result.id(), "Submitting result");

        for attempt in 1..=max_attempts {
            let mut request = self
                .client
                .post(&self.endpoint)
                .header("Prefer", "return=minimal")
                .json(&row);
            if let Some(key) = &self.api_key {
                request = request.header("apikey", key);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => {
                    if attempt < max_attempts && is_retryable_network_error(&err) {
                        warn!(attempt, "Submission failed, retrying: {err}");
                        sleep(backoff_for_attempt(attempt)).await;
                        continue;
                    }
                    return Err(SubmitError::Network(err));
                }
            };

            let status = response.status();
            if status == StatusCode::OK || status == StatusCode::CREATED {
                debug!(status = status.as_u16(), "Result submitted");
                return Ok(());
            }

            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            if attempt < max_attempts && status.is_server_error() {
                warn!(attempt, status = status.as_u16(), "Server error, retrying");
                sleep(backoff_for_attempt(attempt)).await;
                continue;
            }

            return Err(SubmitError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        Err(SubmitError::Unreachable)
    }
}

fn to_submission_row(result: &BenchmarkResult) -> SubmissionRow<'_> {
    let metadata = result.metadata();
    let test = |kind: TestKind| result.test(kind);

    SubmissionRow {
        id: result.id().to_string(),
        gpu_name: &metadata.gpu_name,
        vram_size: metadata
            .vram_mb
            .map(|mb| mb.to_string())
            .unwrap_or_else(|| "Unknown".to_string()),
        driver_version: metadata.driver_version.as_deref().unwrap_or("Unknown"),
        os_version: &metadata.os_version,
        uses_wine: metadata.uses_wine,
        butterfly_score: normalized_score(result, TestKind::Butterfly),
        triangles_score: normalized_score(result, TestKind::Triangles),
        ocean_score: normalized_score(result, TestKind::Ocean),
        total_score: result.total_score(),
        complete: result.is_complete(),
        butterfly_avg_fps: test(TestKind::Butterfly).map(|t| t.avg_fps),
        butterfly_min_fps: test(TestKind::Butterfly).map(|t| t.min_fps),
        triangles_avg_fps: test(TestKind::Triangles).map(|t| t.avg_fps),
        triangles_min_fps: test(TestKind::Triangles).map(|t| t.min_fps),
        ocean_avg_fps: test(TestKind::Ocean).map(|t| t.avg_fps),
        ocean_min_fps: test(TestKind::Ocean).map(|t| t.min_fps),
        butterfly_avg_fps_history: history(result, TestKind::Butterfly, true),
        butterfly_min_fps_history: history(result, TestKind::Butterfly, false),
        triangles_avg_fps_history: history(result, TestKind::Triangles, true),
        triangles_min_fps_history: history(result, TestKind::Triangles, false),
        ocean_avg_fps_history: history(result, TestKind::Ocean, true),
        ocean_min_fps_history: history(result, TestKind::Ocean, false),
        ram_size: metadata
            .ram_mb
            .map(|mb| mb.to_string())
            .unwrap_or_else(|| "Unknown".to_string()),
        cpu_name: &metadata.cpu_name,
        created_at: result.created_at().to_rfc3339(),
    }
}

fn normalized_score(result: &BenchmarkResult, kind: TestKind) -> Option<f64> {
    result
        .scores()
        .iter()
        .find(|score| score.test_name == kind.name())
        .map(|score| score.value)
}

fn history(result: &BenchmarkResult, kind: TestKind, avg: bool) -> &[FpsEntry] {
    match result.test(kind) {
        Some(t) if avg => &t.avg_history,
        Some(t) => &t.min_history,
        None => &[],
    }
}

fn normalize_base_url(base_url: &str) -> Option<String> {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn is_retryable_network_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn backoff_for_attempt(attempt: u32) -> Duration {
    // 200ms, 400ms, 800ms ... capped at 2s
    let exponent = attempt.saturating_sub(1).min(4);
    let factor = 2u64.saturating_pow(exponent);
    let ms = 200u64.saturating_mul(factor).min(2_000);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_result;

    fn api_config(base_url: &str) -> ApiConfig {
        ApiConfig {
            enabled: true,
            base_url: base_url.to_string(),
            api_key: Some("  secret  ".to_string()),
            max_retries: 0,
            ..ApiConfig::default()
        }
    }

    #[test]
    fn endpoint_joins_base_url_and_table() {
        let submitter = ResultSubmitter::from_config(&api_config("https://db.example.com/")).unwrap();
        assert_eq!(
            submitter.endpoint(),
            "https://db.example.com/rest/v1/benchmark_results"
        );
        assert_eq!(submitter.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn empty_base_url_is_not_configured() {
        assert!(matches!(
            ResultSubmitter::from_config(&api_config("   ")),
            Err(SubmitError::NotConfigured(_))
        ));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_for_attempt(1), Duration::from_millis(200));
        assert_eq!(backoff_for_attempt(2), Duration::from_millis(400));
        assert_eq!(backoff_for_attempt(3), Duration::from_millis(800));
        assert_eq!(backoff_for_attempt(5), Duration::from_millis(2_000));
        assert_eq!(backoff_for_attempt(30), Duration::from_millis(2_000));
    }

    #[test]
    fn row_flattens_per_test_columns() {
        let result = sample_result();
        let row = serde_json::to_value(to_submission_row(&result)).unwrap();

        assert_eq!(row["gpu_name"], "NVIDIA GeForce RTX 3070");
        assert_eq!(row["vram_size"], "8192");
        assert_eq!(row["ram_size"], "32768");
        assert_eq!(row["butterfly_avg_fps"], 119.0);
        assert_eq!(row["butterfly_avg_fps_history"].as_array().unwrap().len(), 2);
        assert_eq!(row["complete"], true);
        assert!(row["ocean_score"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        // Nothing listens on the discard port on loopback.
        let submitter = ResultSubmitter::from_config(&api_config("http://127.0.0.1:9")).unwrap();
        let err = submitter.submit(&sample_result()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Network(_)));
    }
}
