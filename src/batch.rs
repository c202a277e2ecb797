//! Batch coordination
//!
//! Drives the per-target pipeline over an ordered list of targets and guarantees
//! that one target's failure never aborts the batch: every per-target error is
//! folded into an outcome row at this boundary. The only batch-level abort is a
//! missing or empty input list.
//!
//! Targets fan out through a bounded-concurrency stream whose results are
//! collected in input order, so the exported report always matches the input
//! list line for line; a parallelism of 1 reproduces strictly sequential runs.

use crate::client::ApiClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::export;
use crate::fetch::fetch_artifact;
use crate::poll::{self, MonitorReport};
use crate::submit::{ResponseAction, SubmissionRecord, submit};
use crate::types::{AgentGuid, Outcome, TaskId};
use crate::unpack::{SevenZipTool, unpack_artifact};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Read a line-delimited UTF-8 id list.
///
/// Blank lines are ignored and order is preserved. A missing file or a list with
/// no usable lines fails fast — the caller's entire batch aborts, per contract.
pub fn read_id_list(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        return Err(Error::TargetList {
            path: path.to_path_buf(),
            reason: "file does not exist".to_string(),
        });
    }
    let raw = std::fs::read_to_string(path)?;
    let ids: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Err(Error::TargetList {
            path: path.to_path_buf(),
            reason: "no usable ids".to_string(),
        });
    }
    Ok(ids)
}

/// One row of a collect-file batch
#[derive(Clone, Debug)]
pub struct CollectFileRow {
    /// Target agent
    pub agent_guid: AgentGuid,
    /// Remote path that was requested
    pub file_path: String,
    /// Task id, when the submission yielded one
    pub task_id: Option<TaskId>,
    /// Terminal outcome tag
    pub outcome: Outcome,
}

/// One row of a download batch
#[derive(Clone, Debug)]
pub struct DownloadRow {
    /// Task whose artifact was processed
    pub task_id: TaskId,
    /// Terminal outcome tag
    pub outcome: Outcome,
    /// Archive password reported by the platform, when known
    pub password: Option<String>,
    /// Derived nested-extraction folder names
    pub extracted_folders: Vec<String>,
}

/// Files written by a workflow run
#[derive(Clone, Debug, Default)]
pub struct WorkflowExports {
    /// CSV report, absent when there were no rows
    pub report: Option<PathBuf>,
    /// Line-delimited task-id handoff file, absent when no valid ids were produced
    pub task_ids: Option<PathBuf>,
}

/// Batch pipeline over one tenant's API
#[derive(Clone, Debug)]
pub struct Pipeline {
    client: ApiClient,
    config: Config,
}

impl Pipeline {
    /// Build a pipeline from an authenticated client and configuration
    pub fn new(client: ApiClient, config: Config) -> Self {
        Self { client, config }
    }

    /// The underlying API client
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    fn parallelism(&self) -> usize {
        self.config.pipeline.batch_parallelism.max(1)
    }

    /// Submit one action against every agent, in input order.
    pub async fn submit_batch(
        &self,
        agents: &[AgentGuid],
        action: &ResponseAction,
    ) -> Vec<SubmissionRecord> {
        info!(targets = agents.len(), endpoint = action.endpoint(), "starting submission batch");
        futures::stream::iter(agents.iter().cloned())
            .map(|agent| {
                let client = self.client.clone();
                let action = action.clone();
                async move { submit(&client, &agent, &action).await }
            })
            .buffered(self.parallelism())
            .collect()
            .await
    }

    /// Run-script workflow: read agents from `list_path`, submit, export the CSV
    /// report and the task-id handoff list.
    pub async fn run_script_workflow(
        &self,
        list_path: &Path,
        script_name: &str,
        parameter: Option<String>,
    ) -> Result<(Vec<SubmissionRecord>, WorkflowExports)> {
        let agents: Vec<AgentGuid> = read_id_list(list_path)?
            .into_iter()
            .map(AgentGuid::new)
            .collect();
        let action = ResponseAction::run_script(script_name, parameter);
        let rows = self.submit_batch(&agents, &action).await;

        let export_dir = &self.config.pipeline.export_dir;
        let exports = WorkflowExports {
            report: export::export_script_runs(&rows, export_dir)?,
            task_ids: export::export_task_ids(&collect_task_ids(&rows), export_dir)?,
        };
        Ok((rows, exports))
    }

    /// Collect-file workflow: read agents from `list_path`, request collection of
    /// `file_path` from each, export the report and the task-id handoff list.
    pub async fn collect_file_workflow(
        &self,
        list_path: &Path,
        file_path: &str,
    ) -> Result<(Vec<CollectFileRow>, WorkflowExports)> {
        let agents: Vec<AgentGuid> = read_id_list(list_path)?
            .into_iter()
            .map(AgentGuid::new)
            .collect();
        let action = ResponseAction::collect_file(file_path);
        let rows: Vec<CollectFileRow> = self
            .submit_batch(&agents, &action)
            .await
            .into_iter()
            .map(|record| CollectFileRow {
                agent_guid: record.agent_guid,
                file_path: file_path.to_string(),
                task_id: record.task_id,
                outcome: record.outcome,
            })
            .collect();

        let export_dir = &self.config.pipeline.export_dir;
        let task_ids: Vec<TaskId> = rows.iter().filter_map(|r| r.task_id.clone()).collect();
        let exports = WorkflowExports {
            report: export::export_collect_files(&rows, export_dir)?,
            task_ids: export::export_task_ids(&task_ids, export_dir)?,
        };
        Ok((rows, exports))
    }

    /// Download workflow: read task ids from `list_path`, fetch and unpack each
    /// task's artifact, export the report.
    pub async fn download_workflow(
        &self,
        list_path: &Path,
    ) -> Result<(Vec<DownloadRow>, WorkflowExports)> {
        let task_ids: Vec<TaskId> = read_id_list(list_path)?
            .into_iter()
            .map(TaskId::from)
            .collect();
        let rows = self.download_batch(&task_ids).await;

        let exports = WorkflowExports {
            report: export::export_downloads(&rows, &self.config.pipeline.export_dir)?,
            task_ids: None,
        };
        Ok((rows, exports))
    }

    /// Fetch and unpack the artifact of every task, in input order.
    pub async fn download_batch(&self, task_ids: &[TaskId]) -> Vec<DownloadRow> {
        // Resolve the tool once; a missing binary surfaces per task as
        // Extract Failed so earlier stages still report their own failures.
        let tool = match SevenZipTool::resolve(self.config.tools.sevenzip_path.as_deref()) {
            Ok(tool) => Some(tool),
            Err(e) => {
                warn!(error = %e, "7-Zip unavailable, extraction will fail per task");
                None
            }
        };

        info!(tasks = task_ids.len(), "starting download batch");
        futures::stream::iter(task_ids.iter().cloned())
            .map(|task_id| {
                let tool = tool.clone();
                async move { self.process_task(task_id, tool.as_ref()).await }
            })
            .buffered(self.parallelism())
            .collect()
            .await
    }

    /// Full per-task pipeline: detail lookup, terminal check, fetch, unpack.
    /// Infallible by design — every failure becomes the row's outcome tag.
    async fn process_task(&self, task_id: TaskId, tool: Option<&SevenZipTool>) -> DownloadRow {
        let detail = match poll::task_detail(&self.client, &task_id).await {
            Ok(detail) => detail,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "task lookup failed");
                return DownloadRow {
                    task_id,
                    outcome: Outcome::Failed,
                    password: None,
                    extracted_folders: Vec::new(),
                };
            }
        };

        let url = match poll::resource_location(&detail, &task_id) {
            Ok(url) => url,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "task artifact not downloadable");
                return DownloadRow {
                    task_id,
                    outcome: Outcome::Failed,
                    password: detail.password,
                    extracted_folders: Vec::new(),
                };
            }
        };

        let archive = match fetch_artifact(
            self.client.http(),
            &url,
            &self.config.pipeline.download_dir,
            &task_id,
            self.config.pipeline.min_artifact_bytes,
        )
        .await
        {
            Ok(path) => path,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "artifact download failed");
                return DownloadRow {
                    task_id,
                    outcome: Outcome::DownloadFailed,
                    password: detail.password,
                    extracted_folders: Vec::new(),
                };
            }
        };

        let Some(tool) = tool else {
            return DownloadRow {
                task_id,
                outcome: Outcome::ExtractFailed,
                password: detail.password,
                extracted_folders: Vec::new(),
            };
        };

        match unpack_artifact(
            tool,
            &archive,
            &task_id,
            detail.password.as_deref(),
            &self.config.pipeline.extract_dir,
            &self.config.pipeline.nested_dir,
            &self.config.pipeline.nested_archive_name,
        )
        .await
        {
            Ok(report) => DownloadRow {
                task_id,
                outcome: Outcome::Success,
                password: detail.password,
                extracted_folders: report.nested_folders,
            },
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "extraction failed");
                DownloadRow {
                    task_id,
                    outcome: Outcome::ExtractFailed,
                    password: detail.password,
                    extracted_folders: Vec::new(),
                }
            }
        }
    }

    /// Monitor workflow: read task ids from `list_path` and poll until every task
    /// is terminal, the token is cancelled, or the optional deadline elapses.
    pub async fn monitor_workflow(
        &self,
        list_path: &Path,
        cancel: &CancellationToken,
        deadline: Option<std::time::Duration>,
    ) -> Result<MonitorReport> {
        let task_ids: Vec<TaskId> = read_id_list(list_path)?
            .into_iter()
            .map(TaskId::from)
            .collect();
        Ok(poll::monitor(
            &self.client,
            &task_ids,
            self.config.pipeline.poll_interval(),
            cancel,
            deadline,
        )
        .await)
    }
}

fn collect_task_ids(rows: &[SubmissionRecord]) -> Vec<TaskId> {
    rows.iter().filter_map(|r| r.task_id.clone()).collect()
}
