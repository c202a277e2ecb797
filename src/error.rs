//! Error types for edr-response
//!
//! This module provides the error taxonomy used throughout the library:
//! - Transport failures (network errors and non-2xx API responses)
//! - Response-shape failures (unexpected envelope or body)
//! - Task lifecycle failures (not yet terminal, missing download URL)
//! - Artifact integrity and extraction failures

use crate::types::{TaskId, TaskStatus};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for edr-response operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for edr-response
///
/// Each variant carries enough context (task id, path, HTTP status) to report a
/// failure against the target it belongs to. Batch workflows catch these at the
/// coordinator boundary and fold them into per-target outcome rows; nothing here
/// is retried automatically.
#[derive(Debug, Error)]
pub enum Error {
    /// Network-level failure or non-2xx API response.
    ///
    /// Authorization failures surface here as a 401/403 status; the remote API
    /// does not distinguish them further and neither do we.
    #[error("transport error: {message}")]
    Transport {
        /// Human-readable description of the failure
        message: String,
        /// HTTP status code, when the request completed with a non-success status
        status: Option<u16>,
    },

    /// The response arrived but its shape was not what the API contract promises
    #[error("unexpected response shape: {0}")]
    ResponseShape(String),

    /// Task exists but has not reached a terminal state yet
    #[error("task {task_id} not ready: status {status}")]
    NotReady {
        /// The task being queried
        task_id: TaskId,
        /// Last observed status
        status: TaskStatus,
    },

    /// Terminal task carries no download URL
    #[error("task {0} has no resource location")]
    NoResource(TaskId),

    /// Downloaded artifact failed the integrity heuristic
    #[error("undersized download at {path:?}: {size} bytes (minimum {min})")]
    Integrity {
        /// Local path of the rejected file
        path: PathBuf,
        /// Observed file size
        size: u64,
        /// Minimum accepted size
        min: u64,
    },

    /// The external decompression tool could not be found
    #[error("7-Zip executable not found ({0}); install 7-Zip or set `sevenzip_path`")]
    ToolMissing(String),

    /// Archive extraction failed
    #[error("extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download_dir")
        key: Option<String>,
    },

    /// Batch input list missing or empty — the only batch-level abort condition
    #[error("invalid id list {path:?}: {reason}")]
    TargetList {
        /// Path of the offending list file
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport {
            message: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
        }
    }
}

/// Extraction-stage errors (primary 7z pass and nested archive pass)
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The 7z subprocess exited with a non-zero status
    #[error("7z exited with {code:?} for {archive:?}: {stderr}")]
    SevenZipFailed {
        /// Archive that failed to extract
        archive: PathBuf,
        /// Process exit code, if any
        code: Option<i32>,
        /// Captured stderr from the tool
        stderr: String,
    },

    /// Extraction succeeded but produced no entries
    #[error("archive {archive:?} produced no entries")]
    EmptyArchive {
        /// Archive that yielded nothing
        archive: PathBuf,
    },

    /// The nested archive could not be opened or read
    #[error("bad nested archive {archive:?}: {reason}")]
    BadNestedArchive {
        /// Path of the nested archive
        archive: PathBuf,
        /// Underlying problem
        reason: String,
    },
}
