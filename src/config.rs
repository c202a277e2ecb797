//! Configuration types for edr-response

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level library configuration
///
/// Groups pipeline directories, polling cadence, and external-tool settings.
/// Every field has a sensible default so `Config::default()` works out of the box.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Pipeline directories and batch behavior
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Pipeline behavior configuration (directories, polling, concurrency)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory for downloaded result archives (default: "./downloaded_files")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Base directory for per-task extraction output (default: "./extracted_files")
    ///
    /// Each task extracts into `{extract_dir}/{task_id}` so concurrent runs on the
    /// same filesystem cannot collide.
    #[serde(default = "default_extract_dir")]
    pub extract_dir: PathBuf,

    /// Destination for the nested conventional archive pass (default: "./assessment_file")
    #[serde(default = "default_nested_dir")]
    pub nested_dir: PathBuf,

    /// Directory for exported CSV/TXT reports (default: "./exported_results")
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// File name of the conventional nested archive, compared case-insensitively
    /// (default: "assessment.zip")
    #[serde(default = "default_nested_archive_name")]
    pub nested_archive_name: String,

    /// Seconds between monitor polling rounds (default: 30)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Minimum artifact size in bytes; smaller downloads are rejected as corrupt
    /// (default: 500)
    ///
    /// This heuristic can false-negative on tiny valid payloads.
    #[serde(default = "default_min_artifact_bytes")]
    pub min_artifact_bytes: u64,

    /// Maximum concurrent per-target pipelines in a batch run (default: 4)
    ///
    /// Results are reassembled in input order regardless of this limit; `1`
    /// reproduces strictly sequential iteration.
    #[serde(default = "default_batch_parallelism")]
    pub batch_parallelism: usize,
}

impl PipelineConfig {
    /// Polling interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            extract_dir: default_extract_dir(),
            nested_dir: default_nested_dir(),
            export_dir: default_export_dir(),
            nested_archive_name: default_nested_archive_name(),
            poll_interval_secs: default_poll_interval_secs(),
            min_artifact_bytes: default_min_artifact_bytes(),
            batch_parallelism: default_batch_parallelism(),
        }
    }
}

/// External tool paths
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the 7z executable (auto-detected on PATH if None)
    #[serde(default)]
    pub sevenzip_path: Option<PathBuf>,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloaded_files")
}

fn default_extract_dir() -> PathBuf {
    PathBuf::from("./extracted_files")
}

fn default_nested_dir() -> PathBuf {
    PathBuf::from("./assessment_file")
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("./exported_results")
}

fn default_nested_archive_name() -> String {
    "assessment.zip".to_string()
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_min_artifact_bytes() -> u64 {
    500
}

fn default_batch_parallelism() -> usize {
    4
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behavior() {
        let config = Config::default();
        assert_eq!(config.pipeline.poll_interval_secs, 30);
        assert_eq!(config.pipeline.min_artifact_bytes, 500);
        assert_eq!(config.pipeline.nested_archive_name, "assessment.zip");
        assert!(config.tools.sevenzip_path.is_none());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"pipeline": {"batch_parallelism": 1}}"#).unwrap();
        assert_eq!(config.pipeline.batch_parallelism, 1);
        assert_eq!(config.pipeline.poll_interval_secs, 30);
    }
}
