//! Report export
//!
//! Serializes workflow outcome rows to timestamped CSV files with fixed,
//! stable column orders, and task-id lists to plain line-delimited text for
//! hand-off to the monitor workflow. Exporting zero rows is a warning and a
//! no-op, never an error. Re-exporting the same rows produces the same row
//! content; only the timestamp in the file name differs.

use crate::batch::{CollectFileRow, DownloadRow};
use crate::catalog::AgentInfo;
use crate::error::Result;
use crate::submit::SubmissionRecord;
use crate::types::TaskId;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Placeholder for absent identifiers and values in reports
pub const NOT_AVAILABLE: &str = "N/A";

fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn open_writer(dir: &Path, file_name: &str) -> Result<(csv::Writer<std::fs::File>, PathBuf)> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    let writer = csv::WriterBuilder::new().from_path(&path)?;
    Ok((writer, path))
}

/// Export run-script submission rows to `run_script_results_{ts}.csv`
pub fn export_script_runs(
    rows: &[SubmissionRecord],
    dir: &Path,
) -> Result<Option<PathBuf>> {
    if rows.is_empty() {
        warn!("no run-script rows to export");
        return Ok(None);
    }
    let (mut writer, path) = open_writer(dir, &format!("run_script_results_{}.csv", timestamp()))?;
    writer.write_record(["Agent GUID", "Task ID", "Task URL", "Status"])?;
    for row in rows {
        writer.write_record([
            row.agent_guid.as_str(),
            row.task_id.as_ref().map_or(NOT_AVAILABLE, TaskId::as_str),
            row.task_url.as_deref().unwrap_or(NOT_AVAILABLE),
            &row.outcome.to_string(),
        ])?;
    }
    writer.flush()?;
    info!(path = ?path, rows = rows.len(), "run-script report exported");
    Ok(Some(path))
}

/// Export collect-file rows to `collect_file_results_{ts}.csv`
pub fn export_collect_files(rows: &[CollectFileRow], dir: &Path) -> Result<Option<PathBuf>> {
    if rows.is_empty() {
        warn!("no collect-file rows to export");
        return Ok(None);
    }
    let (mut writer, path) =
        open_writer(dir, &format!("collect_file_results_{}.csv", timestamp()))?;
    writer.write_record(["Agent GUID", "File Path", "Task ID", "Status"])?;
    for row in rows {
        writer.write_record([
            row.agent_guid.as_str(),
            row.file_path.as_str(),
            row.task_id.as_ref().map_or(NOT_AVAILABLE, TaskId::as_str),
            &row.outcome.to_string(),
        ])?;
    }
    writer.flush()?;
    info!(path = ?path, rows = rows.len(), "collect-file report exported");
    Ok(Some(path))
}

/// Export download pipeline rows to `download_results_{ts}.csv`
pub fn export_downloads(rows: &[DownloadRow], dir: &Path) -> Result<Option<PathBuf>> {
    if rows.is_empty() {
        warn!("no download rows to export");
        return Ok(None);
    }
    let (mut writer, path) = open_writer(dir, &format!("download_results_{}.csv", timestamp()))?;
    writer.write_record(["Task ID", "Status", "Password", "Extracted Files"])?;
    for row in rows {
        let folders = if row.extracted_folders.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            row.extracted_folders.join(", ")
        };
        writer.write_record([
            row.task_id.as_str(),
            &row.outcome.to_string(),
            row.password.as_deref().unwrap_or(NOT_AVAILABLE),
            &folders,
        ])?;
    }
    writer.flush()?;
    info!(path = ?path, rows = rows.len(), "download report exported");
    Ok(Some(path))
}

/// Export agent inventory rows to `clients_{ts}.csv`
pub fn export_agents(agents: &[AgentInfo], dir: &Path) -> Result<Option<PathBuf>> {
    if agents.is_empty() {
        warn!("no agent rows to export");
        return Ok(None);
    }
    let (mut writer, path) = open_writer(dir, &format!("clients_{}.csv", timestamp()))?;
    writer.write_record([
        "Agent GUID",
        "Endpoint Name",
        "Last Used IP",
        "OS Name",
        "EDR Sensor Connectivity",
    ])?;
    for agent in agents {
        writer.write_record([
            agent.agent_guid.as_str(),
            &agent.endpoint_name,
            &agent.last_used_ip,
            &agent.os_name,
            &agent.edr_connectivity,
        ])?;
    }
    writer.flush()?;
    info!(path = ?path, rows = agents.len(), "agent inventory exported");
    Ok(Some(path))
}

/// Export valid task ids, one per line, to `task_ids_{ts}.txt`.
///
/// This is the hand-off file consumed by the monitor workflow; callers filter
/// out missing ids before calling.
pub fn export_task_ids(task_ids: &[TaskId], dir: &Path) -> Result<Option<PathBuf>> {
    if task_ids.is_empty() {
        warn!("no task ids to export");
        return Ok(None);
    }
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("task_ids_{}.txt", timestamp()));
    let mut content = task_ids
        .iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join("\n");
    content.push('\n');
    std::fs::write(&path, content)?;
    info!(path = ?path, count = task_ids.len(), "task ids exported");
    Ok(Some(path))
}
