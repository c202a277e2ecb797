//! Response-action submission
//!
//! Builds the per-agent action request (run script, collect file, run YARA rules)
//! and interprets the platform's 207 multi-status envelope. The envelope parser is
//! centralized here and shared by every action: per-item results carry their own
//! numeric sub-status plus a header list, and an accepted item points at its task
//! via the `Operation-Location` header.

use crate::client::{ApiBody, ApiClient};
use crate::types::{AgentGuid, Outcome, TaskId};
use serde_json::{Value, json};
use tracing::{info, warn};

/// A response action to run against one agent
#[derive(Clone, Debug)]
pub enum ResponseAction {
    /// Run a previously uploaded custom script on the endpoint
    RunScript {
        /// Script file name as registered in the platform catalog
        script_name: String,
        /// Optional interpreter arguments
        parameter: Option<String>,
        /// Task description shown in the platform console
        description: String,
    },
    /// Collect a file from the endpoint
    CollectFile {
        /// Absolute path of the file on the endpoint
        file_path: String,
        /// Task description shown in the platform console
        description: String,
    },
    /// Run YARA rules against files on the endpoint
    RunYaraRules {
        /// YARA rule file name as registered in the platform
        rule_file_name: String,
        /// Directory or file to scan on the endpoint
        target_file_location: String,
        /// Per-file size cap understood by the scanner (e.g. "1M")
        target_file_size: String,
        /// Scan option keyword (e.g. "SCAN_ALL")
        target_file_option: String,
        /// Task description shown in the platform console
        description: String,
    },
}

impl ResponseAction {
    /// Run-script action with the default description
    pub fn run_script(script_name: impl Into<String>, parameter: Option<String>) -> Self {
        Self::RunScript {
            script_name: script_name.into(),
            parameter,
            description: "Run custom script task".to_string(),
        }
    }

    /// Collect-file action with the default description
    pub fn collect_file(file_path: impl Into<String>) -> Self {
        Self::CollectFile {
            file_path: file_path.into(),
            description: "Collect file task".to_string(),
        }
    }

    /// YARA-scan action with the default size cap, scan option, and description
    pub fn run_yara(rule_file_name: impl Into<String>, target_file_location: impl Into<String>) -> Self {
        Self::RunYaraRules {
            rule_file_name: rule_file_name.into(),
            target_file_location: target_file_location.into(),
            target_file_size: "1M".to_string(),
            target_file_option: "SCAN_ALL".to_string(),
            description: "Run YARA rule task".to_string(),
        }
    }

    /// API endpoint this action posts to
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::RunScript { .. } => "/v3.0/response/endpoints/runScript",
            Self::CollectFile { .. } => "/v3.0/response/endpoints/collectFile",
            Self::RunYaraRules { .. } => "/v3.0/response/endpoints/runYaraRules",
        }
    }

    /// Single-element request array for one agent.
    ///
    /// The remote API batches by array position; this library always submits one
    /// element per call so the multi-status response maps 1:1 to the agent.
    pub fn payload(&self, agent: &AgentGuid) -> Value {
        match self {
            Self::RunScript {
                script_name,
                parameter,
                description,
            } => json!([{
                "agentGuid": agent.as_str(),
                "fileName": script_name,
                "parameter": parameter.clone().unwrap_or_default(),
                "description": description,
            }]),
            Self::CollectFile {
                file_path,
                description,
            } => json!([{
                "agentGuid": agent.as_str(),
                "filePath": file_path,
                "description": description,
            }]),
            Self::RunYaraRules {
                rule_file_name,
                target_file_location,
                target_file_size,
                target_file_option,
                description,
            } => json!([{
                "agentGuid": agent.as_str(),
                "target": "File",
                "targetFileLocation": target_file_location,
                "targetFileSize": target_file_size,
                "targetFileOption": target_file_option,
                "yaraRuleFileName": rule_file_name,
                "description": description,
            }]),
        }
    }
}

/// Parsed multi-status envelope for a single-element submission
#[derive(Clone, Debug, PartialEq)]
pub enum Submission {
    /// The item was accepted (sub-status 202); the task id is absent when the
    /// `Operation-Location` header was missing from the item
    Accepted {
        /// Task id recovered from the `Operation-Location` header
        task_id: Option<TaskId>,
        /// Full task URL from the header, when present
        task_url: Option<String>,
    },
    /// The item carried a non-accepted sub-status
    Rejected {
        /// Per-item sub-status code
        status: u16,
    },
    /// The body was not the promised array-of-items shape
    Malformed,
}

/// Interpret the multi-status body of a single-element submission.
///
/// Only the first item is inspected; this library never submits more than one
/// element per call.
pub fn parse_multi_status(body: &Value) -> Submission {
    let Some(item) = body.as_array().and_then(|items| items.first()) else {
        return Submission::Malformed;
    };
    let Some(status) = item.get("status").and_then(Value::as_u64) else {
        return Submission::Malformed;
    };
    if status != 202 {
        return Submission::Rejected {
            status: status as u16,
        };
    }

    let task_url = item
        .get("headers")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find(|h| h.get("name").and_then(Value::as_str) == Some("Operation-Location"))
        .and_then(|h| h.get("value").and_then(Value::as_str))
        .map(str::to_string);

    let task_id = task_url
        .as_deref()
        .and_then(|url| url.rsplit('/').next())
        .filter(|segment| !segment.is_empty())
        .map(TaskId::from);

    Submission::Accepted { task_id, task_url }
}

/// Outcome of submitting one action against one agent
#[derive(Clone, Debug)]
pub struct SubmissionRecord {
    /// Target agent
    pub agent_guid: AgentGuid,
    /// Task id, absent when submission failed or the envelope carried no id
    pub task_id: Option<TaskId>,
    /// Full task URL when the platform provided one
    pub task_url: Option<String>,
    /// Terminal outcome tag for this submission
    pub outcome: Outcome,
}

impl SubmissionRecord {
    fn failed(agent_guid: AgentGuid) -> Self {
        Self {
            agent_guid,
            task_id: None,
            task_url: None,
            outcome: Outcome::Failed,
        }
    }
}

/// Submit one action against one agent.
///
/// Never returns an error: transport failures, rejected items, and malformed
/// envelopes all fold into the record's outcome tag, so a batch caller can drive
/// many targets without any of them aborting the run. No retries happen here.
pub async fn submit(
    client: &ApiClient,
    agent: &AgentGuid,
    action: &ResponseAction,
) -> SubmissionRecord {
    let body = match client.post_json(action.endpoint(), &action.payload(agent)).await {
        Ok(ApiBody::Json(body)) => body,
        Ok(ApiBody::NoContent) => {
            warn!(agent = %agent, "submission returned no body");
            return SubmissionRecord::failed(agent.clone());
        }
        Err(e) => {
            warn!(agent = %agent, error = %e, "submission failed");
            return SubmissionRecord::failed(agent.clone());
        }
    };

    match parse_multi_status(&body) {
        Submission::Accepted {
            task_id: Some(task_id),
            task_url,
        } => {
            info!(agent = %agent, task_id = %task_id, "action accepted");
            SubmissionRecord {
                agent_guid: agent.clone(),
                task_id: Some(task_id),
                task_url,
                outcome: Outcome::Success,
            }
        }
        Submission::Accepted {
            task_id: None,
            task_url,
        } => {
            // Degraded acceptance: the platform took the job but gave us no handle
            // to poll it with. Surfaced as Accepted, never promoted to Success.
            warn!(agent = %agent, "action accepted without Operation-Location header");
            SubmissionRecord {
                agent_guid: agent.clone(),
                task_id: None,
                task_url,
                outcome: Outcome::Accepted,
            }
        }
        Submission::Rejected { status } => {
            warn!(agent = %agent, status, "action rejected by platform");
            SubmissionRecord::failed(agent.clone())
        }
        Submission::Malformed => {
            warn!(agent = %agent, "response format anomaly");
            SubmissionRecord::failed(agent.clone())
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn accepted_envelope(task_url: &str) -> Value {
        json!([{
            "status": 202,
            "headers": [
                {"name": "Content-Type", "value": "application/json"},
                {"name": "Operation-Location", "value": task_url},
            ],
        }])
    }

    #[test]
    fn envelope_accepted_with_task_id() {
        let body = accepted_envelope("https://api.example.com/v3.0/response/tasks/T-100");
        assert_eq!(
            parse_multi_status(&body),
            Submission::Accepted {
                task_id: Some(TaskId::from("T-100")),
                task_url: Some(
                    "https://api.example.com/v3.0/response/tasks/T-100".to_string()
                ),
            }
        );
    }

    #[test]
    fn envelope_accepted_without_operation_location() {
        let body = json!([{"status": 202, "headers": [{"name": "X-Other", "value": "x"}]}]);
        assert_eq!(
            parse_multi_status(&body),
            Submission::Accepted {
                task_id: None,
                task_url: None,
            }
        );
    }

    #[test]
    fn envelope_rejected_substatus() {
        let body = json!([{"status": 403, "headers": []}]);
        assert_eq!(parse_multi_status(&body), Submission::Rejected { status: 403 });
    }

    #[test]
    fn envelope_malformed_shapes() {
        assert_eq!(parse_multi_status(&json!({})), Submission::Malformed);
        assert_eq!(parse_multi_status(&json!([])), Submission::Malformed);
        assert_eq!(
            parse_multi_status(&json!([{"headers": []}])),
            Submission::Malformed
        );
    }

    #[test]
    fn payloads_are_single_element_arrays() {
        let agent = AgentGuid::from("G-1");
        for action in [
            ResponseAction::run_script("audit.ps1", Some("-Verbose".to_string())),
            ResponseAction::collect_file(r"C:\Windows\Temp\report.log"),
            ResponseAction::run_yara("rules.yara", r"C:\Users"),
        ] {
            let payload = action.payload(&agent);
            let items = payload.as_array().unwrap();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0]["agentGuid"], "G-1");
        }
    }

    #[tokio::test]
    async fn submit_maps_accepted_envelope_to_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3.0/response/endpoints/runScript"))
            .and(body_partial_json(json!([{"agentGuid": "G-1", "fileName": "audit.ps1"}])))
            .respond_with(
                ResponseTemplate::new(207)
                    .set_body_json(accepted_envelope("https://api.example.com/tasks/T-100")),
            )
            .mount(&server)
            .await;

        let client = ApiClient::from_parts(&server.uri(), "token").unwrap();
        let record = submit(
            &client,
            &AgentGuid::from("G-1"),
            &ResponseAction::run_script("audit.ps1", None),
        )
        .await;

        assert_eq!(record.outcome, Outcome::Success);
        assert_eq!(record.task_id, Some(TaskId::from("T-100")));
    }

    #[tokio::test]
    async fn submit_maps_transport_failure_to_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ApiClient::from_parts(&server.uri(), "token").unwrap();
        let record = submit(
            &client,
            &AgentGuid::from("G-2"),
            &ResponseAction::collect_file(r"C:\evidence.bin"),
        )
        .await;

        assert_eq!(record.outcome, Outcome::Failed);
        assert!(record.task_id.is_none());
    }
}
