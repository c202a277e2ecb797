//! # edr-response
//!
//! Backend library for automating response actions against an endpoint-security
//! platform: run scripts, collect files, and run YARA rules across fleets of
//! agents; poll the resulting asynchronous tasks; download and unpack their
//! password-protected result archives; and export per-target outcome reports.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **One failure never aborts a batch** - Every per-target error becomes an
//!   outcome row; only a missing/empty input list aborts a run
//! - **Ordered results** - Reports always match the input list order, even when
//!   targets are processed concurrently
//! - **No hidden retries** - All retry is operator-driven
//!
//! ## Quick Start
//!
//! ```no_run
//! use edr_response::{ApiClient, Config, Pipeline, ResponseAction, TenantStore};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = TenantStore::open("tenants.json")?;
//!     let tenant = store.require_active()?;
//!     let pipeline = Pipeline::new(ApiClient::new(&tenant)?, Config::default());
//!
//!     let (rows, exports) = pipeline
//!         .run_script_workflow(Path::new("agents.txt"), "audit.ps1", None)
//!         .await?;
//!     println!("{} targets processed, report at {:?}", rows.len(), exports.report);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Batch coordination and workflows
pub mod batch;
/// Catalog and inventory queries
pub mod catalog;
/// Platform API client
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Report export
pub mod export;
/// Result artifact download
pub mod fetch;
/// Task status polling
pub mod poll;
/// Response-action submission
pub mod submit;
/// Tenant credential store
pub mod tenants;
/// Core types
pub mod types;
/// Archive unpacking
pub mod unpack;

// Re-export commonly used types
pub use batch::{CollectFileRow, DownloadRow, Pipeline, WorkflowExports, read_id_list};
pub use catalog::{AgentInfo, ScriptInfo, YaraRuleInfo};
pub use client::{ApiBody, ApiClient};
pub use config::{Config, PipelineConfig, ToolsConfig};
pub use error::{Error, ExtractError, Result};
pub use poll::{MonitorOutcome, MonitorReport};
pub use submit::{ResponseAction, Submission, SubmissionRecord, parse_multi_status};
pub use tenants::{Tenant, TenantStore};
pub use types::{AgentGuid, Outcome, TaskDetail, TaskId, TaskStatus};
pub use unpack::{SevenZipTool, UnpackReport, derive_collection_name};
