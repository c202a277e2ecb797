//! Core types for edr-response

use serde::{Deserialize, Serialize};

/// Opaque identifier of a server-side asynchronous task
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Opaque identifier of a managed endpoint agent
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentGuid(pub String);

impl AgentGuid {
    /// Create a new AgentGuid
    pub fn new(guid: impl Into<String>) -> Self {
        Self(guid.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentGuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentGuid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Normalized task status
///
/// The remote vocabulary is open-ended; anything we do not recognize is kept
/// verbatim in [`TaskStatus::Other`] and treated as non-terminal. A failed status
/// *query* (as opposed to a failed task) maps to [`TaskStatus::Unknown`], which is
/// also non-terminal — the task may well still be running.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task finished successfully (vendor words: "succeeded", "completed")
    Succeeded,
    /// Task finished unsuccessfully
    Failed,
    /// Task is executing
    Running,
    /// Task is waiting to execute
    Queued,
    /// Unrecognized vendor status, kept verbatim
    Other(String),
    /// Status could not be determined (query failure or missing field)
    Unknown,
}

impl TaskStatus {
    /// Normalize a raw vendor status string, case-insensitively
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "succeeded" | "completed" => TaskStatus::Succeeded,
            "failed" => TaskStatus::Failed,
            "running" => TaskStatus::Running,
            "queued" => TaskStatus::Queued,
            _ => TaskStatus::Other(raw.to_string()),
        }
    }

    /// Whether no further status transition can occur
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Succeeded => write!(f, "Succeeded"),
            TaskStatus::Failed => write!(f, "Failed"),
            TaskStatus::Running => write!(f, "Running"),
            TaskStatus::Queued => write!(f, "Queued"),
            TaskStatus::Other(s) => write!(f, "{s}"),
            TaskStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Terminal outcome of one target's pipeline run
///
/// The `Display` form is the exact tag written to exported reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Pipeline completed (submission got a task id, or download + extraction worked)
    Success,
    /// Submission was accepted but the response carried no task id; degraded,
    /// never promoted to Success
    Accepted,
    /// Submission or status lookup failed
    Failed,
    /// Artifact download failed or the file was undersized
    DownloadFailed,
    /// Primary archive extraction failed
    ExtractFailed,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "Success"),
            Outcome::Accepted => write!(f, "Accepted"),
            Outcome::Failed => write!(f, "Failed"),
            Outcome::DownloadFailed => write!(f, "Download Failed"),
            Outcome::ExtractFailed => write!(f, "Extract Failed"),
        }
    }
}

/// Raw task record returned by the task endpoint
///
/// `resource_location` is only present once the task is terminal-successful;
/// `password` may be legitimately absent ("no password" archives).
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    /// Vendor status word, normalized via [`TaskStatus::parse`]
    #[serde(default)]
    pub status: Option<String>,
    /// Download URL for the result archive
    #[serde(default)]
    pub resource_location: Option<String>,
    /// Decryption password for the result archive
    #[serde(default)]
    pub password: Option<String>,
    /// Vendor-reported original path of the collected file
    #[serde(default)]
    pub file_path: Option<String>,
}

impl TaskDetail {
    /// Normalized status of this record
    pub fn task_status(&self) -> TaskStatus {
        match &self.status {
            Some(raw) => TaskStatus::parse(raw),
            None => TaskStatus::Unknown,
        }
    }

    /// Display file name derived from the vendor-reported path.
    ///
    /// The vendor reports Windows-style paths; only the last backslash-separated
    /// segment is meaningful for display.
    pub fn display_file_name(&self) -> Option<&str> {
        self.file_path
            .as_deref()
            .map(|p| p.rsplit('\\').next().unwrap_or(p))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(TaskStatus::parse("Succeeded"), TaskStatus::Succeeded);
        assert_eq!(TaskStatus::parse("SUCCEEDED"), TaskStatus::Succeeded);
        assert_eq!(TaskStatus::parse("Completed"), TaskStatus::Succeeded);
        assert_eq!(TaskStatus::parse("cOmPlEtEd"), TaskStatus::Succeeded);
        assert_eq!(TaskStatus::parse("FAILED"), TaskStatus::Failed);
        assert_eq!(TaskStatus::parse("Running"), TaskStatus::Running);
        assert_eq!(TaskStatus::parse("queued"), TaskStatus::Queued);
    }

    #[test]
    fn unrecognized_status_is_non_terminal() {
        let status = TaskStatus::parse("inProgress");
        assert_eq!(status, TaskStatus::Other("inProgress".to_string()));
        assert!(!status.is_terminal());
        assert!(!TaskStatus::Unknown.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Queued.is_terminal());
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn outcome_report_tags() {
        assert_eq!(Outcome::Success.to_string(), "Success");
        assert_eq!(Outcome::Accepted.to_string(), "Accepted");
        assert_eq!(Outcome::Failed.to_string(), "Failed");
        assert_eq!(Outcome::DownloadFailed.to_string(), "Download Failed");
        assert_eq!(Outcome::ExtractFailed.to_string(), "Extract Failed");
    }

    #[test]
    fn display_file_name_strips_windows_path() {
        let detail = TaskDetail {
            status: Some("succeeded".to_string()),
            resource_location: Some("https://example.com/archive".to_string()),
            password: None,
            file_path: Some(r"C:\Users\test\Downloads\evidence.bin".to_string()),
        };
        assert_eq!(detail.display_file_name(), Some("evidence.bin"));
    }

    #[test]
    fn missing_status_is_unknown() {
        let detail = TaskDetail {
            status: None,
            resource_location: None,
            password: None,
            file_path: None,
        };
        assert_eq!(detail.task_status(), TaskStatus::Unknown);
    }
}
