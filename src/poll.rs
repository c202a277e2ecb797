//! Task status polling
//!
//! One-shot status lookups for the download pipeline, plus the standalone monitor
//! loop that watches a set of tasks until every one of them reaches a terminal
//! state. The monitor has no retry cap; it stops on terminal completion, on
//! cancellation, or when the optional deadline elapses.

use crate::client::{ApiClient, ApiBody};
use crate::error::{Error, Result};
use crate::types::{TaskDetail, TaskId, TaskStatus};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Fetch the raw task record for a task id
pub async fn task_detail(client: &ApiClient, task_id: &TaskId) -> Result<TaskDetail> {
    let path = format!("/v3.0/response/tasks/{task_id}");
    let body = client.get(&path, &[]).await?.into_json()?;
    serde_json::from_value(body)
        .map_err(|e| Error::ResponseShape(format!("task record for {task_id}: {e}")))
}

/// Normalized status of a task.
///
/// A failed status *query* yields [`TaskStatus::Unknown`], which is non-terminal;
/// the task may still be running even though we could not ask.
pub async fn task_status(client: &ApiClient, task_id: &TaskId) -> TaskStatus {
    match client.get(&format!("/v3.0/response/tasks/{task_id}"), &[]).await {
        Ok(ApiBody::Json(body)) => body
            .get("status")
            .and_then(serde_json::Value::as_str)
            .map(TaskStatus::parse)
            .unwrap_or(TaskStatus::Unknown),
        Ok(ApiBody::NoContent) => TaskStatus::Unknown,
        Err(e) => {
            warn!(task_id = %task_id, error = %e, "status query failed");
            TaskStatus::Unknown
        }
    }
}

/// Download URL of a terminal-successful task.
///
/// A task that is not yet terminal-successful is [`Error::NotReady`]; a terminal
/// task without a usable `resourceLocation` is [`Error::NoResource`].
pub fn resource_location(detail: &TaskDetail, task_id: &TaskId) -> Result<String> {
    let status = detail.task_status();
    if status != TaskStatus::Succeeded {
        return Err(Error::NotReady {
            task_id: task_id.clone(),
            status,
        });
    }
    detail
        .resource_location
        .as_deref()
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::NoResource(task_id.clone()))
}

/// Task ids from one polling round that are not yet terminal
pub fn pending_tasks(statuses: &[(TaskId, TaskStatus)]) -> Vec<TaskId> {
    statuses
        .iter()
        .filter(|(_, status)| !status.is_terminal())
        .map(|(id, _)| id.clone())
        .collect()
}

/// How a monitor run ended
#[derive(Clone, Debug, PartialEq)]
pub enum MonitorOutcome {
    /// Every task reached a terminal state
    AllTerminal,
    /// The cancellation token fired; the listed tasks were still pending
    Cancelled(Vec<TaskId>),
    /// The deadline elapsed; the listed tasks were still pending
    DeadlineExceeded(Vec<TaskId>),
}

/// Final report of a monitor run
#[derive(Clone, Debug)]
pub struct MonitorReport {
    /// How the run ended
    pub outcome: MonitorOutcome,
    /// Last observed status per task, in input order
    pub statuses: Vec<(TaskId, TaskStatus)>,
    /// Number of completed polling rounds
    pub rounds: u64,
}

/// Poll all tasks until every one is terminal.
///
/// Each round queries every id (not just the pending ones — a terminal status is
/// re-confirmed for free and keeps the report current), partitions the results,
/// and sleeps `interval` before the next round. There is no retry cap: without a
/// deadline the loop runs until completion or until `cancel` fires, matching the
/// operator-attended reference behavior.
pub async fn monitor(
    client: &ApiClient,
    task_ids: &[TaskId],
    interval: Duration,
    cancel: &CancellationToken,
    deadline: Option<Duration>,
) -> MonitorReport {
    let started = tokio::time::Instant::now();
    let mut rounds = 0;
    info!(tasks = task_ids.len(), "monitoring task statuses");

    loop {
        let mut statuses = Vec::with_capacity(task_ids.len());
        for task_id in task_ids {
            let status = task_status(client, task_id).await;
            info!(task_id = %task_id, status = %status, "task status");
            statuses.push((task_id.clone(), status));
        }
        rounds += 1;

        let pending = pending_tasks(&statuses);
        if pending.is_empty() {
            info!(rounds, "all tasks terminal");
            return MonitorReport {
                outcome: MonitorOutcome::AllTerminal,
                statuses,
                rounds,
            };
        }

        if let Some(limit) = deadline
            && started.elapsed() >= limit
        {
            warn!(pending = pending.len(), "monitor deadline exceeded");
            return MonitorReport {
                outcome: MonitorOutcome::DeadlineExceeded(pending),
                statuses,
                rounds,
            };
        }

        info!(
            pending = pending.len(),
            interval_secs = interval.as_secs_f64(),
            "tasks still pending, sleeping before next round"
        );
        tokio::select! {
            _ = cancel.cancelled() => {
                warn!(pending = pending.len(), "monitor cancelled");
                return MonitorReport {
                    outcome: MonitorOutcome::Cancelled(pending),
                    statuses,
                    rounds,
                };
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ids(raw: &[&str]) -> Vec<TaskId> {
        raw.iter().map(|s| TaskId::from(*s)).collect()
    }

    #[test]
    fn pending_partition_reports_sole_running_task() {
        let statuses = vec![
            (TaskId::from("A"), TaskStatus::Succeeded),
            (TaskId::from("B"), TaskStatus::Running),
        ];
        assert_eq!(pending_tasks(&statuses), ids(&["B"]));
    }

    #[test]
    fn unknown_counts_as_pending() {
        let statuses = vec![
            (TaskId::from("A"), TaskStatus::Unknown),
            (TaskId::from("B"), TaskStatus::Failed),
            (TaskId::from("C"), TaskStatus::Other("inProgress".to_string())),
        ];
        assert_eq!(pending_tasks(&statuses), ids(&["A", "C"]));
    }

    #[tokio::test]
    async fn task_status_maps_query_failure_to_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ApiClient::from_parts(&server.uri(), "token").unwrap();
        let status = task_status(&client, &TaskId::from("T-1")).await;
        assert_eq!(status, TaskStatus::Unknown);
    }

    #[tokio::test]
    async fn monitor_runs_until_all_terminal() {
        let server = MockServer::start().await;
        // First round: running; afterwards: succeeded.
        Mock::given(method("GET"))
            .and(path("/v3.0/response/tasks/T-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "running"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3.0/response/tasks/T-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "succeeded"})))
            .mount(&server)
            .await;

        let client = ApiClient::from_parts(&server.uri(), "token").unwrap();
        let report = monitor(
            &client,
            &ids(&["T-1"]),
            Duration::from_millis(5),
            &CancellationToken::new(),
            None,
        )
        .await;

        assert_eq!(report.outcome, MonitorOutcome::AllTerminal);
        assert_eq!(report.rounds, 2);
        assert_eq!(report.statuses[0].1, TaskStatus::Succeeded);
    }

    #[tokio::test]
    async fn monitor_stops_on_cancellation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "running"})))
            .mount(&server)
            .await;

        let client = ApiClient::from_parts(&server.uri(), "token").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = monitor(
            &client,
            &ids(&["T-1", "T-2"]),
            Duration::from_secs(3600),
            &cancel,
            None,
        )
        .await;

        assert_eq!(report.outcome, MonitorOutcome::Cancelled(ids(&["T-1", "T-2"])));
    }

    #[tokio::test]
    async fn monitor_honors_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "queued"})))
            .mount(&server)
            .await;

        let client = ApiClient::from_parts(&server.uri(), "token").unwrap();
        let report = monitor(
            &client,
            &ids(&["T-1"]),
            Duration::from_millis(1),
            &CancellationToken::new(),
            Some(Duration::ZERO),
        )
        .await;

        assert_eq!(report.outcome, MonitorOutcome::DeadlineExceeded(ids(&["T-1"])));
    }
}
