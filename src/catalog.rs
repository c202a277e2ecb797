//! Catalog and inventory queries
//!
//! Synchronous request/response mappers around the platform's list endpoints:
//! custom scripts, managed agents, and YARA rule files, plus the multipart
//! script upload. No polling or state machine here — one call, one answer.

use crate::client::{ApiBody, ApiClient};
use crate::error::{Error, Result};
use crate::types::AgentGuid;
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// A custom script registered in the platform catalog
#[derive(Clone, Debug)]
pub struct ScriptInfo {
    /// Catalog id
    pub id: String,
    /// Script file name used when submitting run-script actions
    pub file_name: String,
    /// Script interpreter type (e.g. "powershell", "bash")
    pub file_type: Option<String>,
    /// Operator-supplied description
    pub description: Option<String>,
}

/// A managed endpoint agent
#[derive(Clone, Debug)]
pub struct AgentInfo {
    /// Agent GUID used as the target identifier for response actions
    pub agent_guid: AgentGuid,
    /// Host name reported by the agent
    pub endpoint_name: String,
    /// Last IP the agent connected from
    pub last_used_ip: String,
    /// Operating system name
    pub os_name: String,
    /// EDR sensor connectivity, "Disconnected" when the sensor block is absent
    pub edr_connectivity: String,
}

/// A YARA rule file registered in the platform
#[derive(Clone, Debug)]
pub struct YaraRuleInfo {
    /// Rule file id
    pub id: String,
    /// Rule file name used when submitting YARA-scan actions
    pub name: String,
    /// Operator-supplied description
    pub description: Option<String>,
    /// Who last updated the rule file
    pub updated_by: Option<String>,
    /// When the rule file was last updated
    pub updated_date_time: Option<String>,
}

fn items_of(body: Value) -> Result<Vec<Value>> {
    body.get("items")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| Error::ResponseShape("list response has no `items` array".to_string()))
}

fn str_of(item: &Value, key: &str) -> Option<String> {
    item.get(key).and_then(Value::as_str).map(str::to_string)
}

/// List custom scripts registered in the platform catalog
pub async fn list_scripts(client: &ApiClient) -> Result<Vec<ScriptInfo>> {
    let body = client
        .get("/v3.0/response/customScripts", &[])
        .await?
        .into_json()?;
    let scripts = items_of(body)?
        .iter()
        .map(|item| ScriptInfo {
            id: str_of(item, "id").unwrap_or_default(),
            file_name: str_of(item, "fileName").unwrap_or_default(),
            file_type: str_of(item, "fileType"),
            description: str_of(item, "description"),
        })
        .collect();
    Ok(scripts)
}

/// Upload or update a custom script via multipart form.
///
/// The platform answers 201 with a body on create and 204 on update; both map to
/// success here.
pub async fn upload_script(
    client: &ApiClient,
    local_path: &Path,
    file_name: &str,
    file_type: &str,
    description: &str,
) -> Result<()> {
    let content = tokio::fs::read(local_path).await?;
    let part = reqwest::multipart::Part::bytes(content)
        .file_name(file_name.to_string())
        .mime_str("text/plain")
        .map_err(|e| Error::Config {
            message: format!("invalid mime type: {e}"),
            key: None,
        })?;
    let form = reqwest::multipart::Form::new()
        .part("file", part)
        .text("fileType", file_type.to_string())
        .text("description", description.to_string());

    client.post_multipart("/v3.0/response/customScripts", form).await?;
    info!(file_name, "custom script uploaded");
    Ok(())
}

/// List managed agents, ordered by GUID.
///
/// Selects only the fields the reports need; `top` caps the page size.
pub async fn list_agents(client: &ApiClient, top: u32) -> Result<Vec<AgentInfo>> {
    let top = top.to_string();
    let body = client
        .get(
            "/v3.0/endpointSecurity/endpoints",
            &[
                ("orderBy", "agentGuid asc"),
                ("top", &top),
                (
                    "select",
                    "agentGuid,endpointName,lastUsedIp,osName,edrSensorConnectivity",
                ),
            ],
        )
        .await?
        .into_json()?;

    let agents = items_of(body)?
        .iter()
        .map(|item| AgentInfo {
            agent_guid: AgentGuid::new(str_of(item, "agentGuid").unwrap_or_default()),
            endpoint_name: str_of(item, "endpointName").unwrap_or_default(),
            last_used_ip: str_of(item, "lastUsedIp").unwrap_or_default(),
            os_name: str_of(item, "osName").unwrap_or_default(),
            edr_connectivity: item
                .get("edrSensor")
                .and_then(|sensor| sensor.get("connectivity"))
                .and_then(Value::as_str)
                .unwrap_or("Disconnected")
                .to_string(),
        })
        .collect();
    Ok(agents)
}

/// List YARA rule files, optionally filtered
pub async fn list_yara_rules(
    client: &ApiClient,
    filter: Option<&str>,
    top: u32,
) -> Result<Vec<YaraRuleInfo>> {
    let top = top.to_string();
    let mut query: Vec<(&str, &str)> = vec![("top", &top)];
    if let Some(filter) = filter {
        query.push(("filter", filter));
    }
    let body = client
        .get("/v3.0/response/yaraRuleFiles", &query)
        .await?
        .into_json()?;

    let rules = items_of(body)?
        .iter()
        .map(|item| YaraRuleInfo {
            id: str_of(item, "id").unwrap_or_default(),
            name: str_of(item, "name").unwrap_or_default(),
            description: str_of(item, "description"),
            updated_by: str_of(item, "updatedBy"),
            updated_date_time: str_of(item, "updatedDateTime"),
        })
        .collect();
    Ok(rules)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn agent_listing_flattens_sensor_connectivity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3.0/endpointSecurity/endpoints"))
            .and(query_param("orderBy", "agentGuid asc"))
            .and(query_param("top", "1000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {
                        "agentGuid": "G-1",
                        "endpointName": "HOST-1",
                        "lastUsedIp": "10.0.0.5",
                        "osName": "Windows 11",
                        "edrSensor": {"connectivity": "Connected"},
                    },
                    {
                        "agentGuid": "G-2",
                        "endpointName": "HOST-2",
                        "lastUsedIp": "10.0.0.6",
                        "osName": "Ubuntu 22.04",
                    },
                ],
            })))
            .mount(&server)
            .await;

        let client = ApiClient::from_parts(&server.uri(), "token").unwrap();
        let agents = list_agents(&client, 1000).await.unwrap();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].edr_connectivity, "Connected");
        assert_eq!(agents[1].edr_connectivity, "Disconnected");
        assert_eq!(agents[1].agent_guid.as_str(), "G-2");
    }

    #[tokio::test]
    async fn script_listing_maps_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3.0/response/customScripts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "s-1", "fileName": "audit.ps1", "fileType": "powershell"}],
            })))
            .mount(&server)
            .await;

        let client = ApiClient::from_parts(&server.uri(), "token").unwrap();
        let scripts = list_scripts(&client).await.unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].file_name, "audit.ps1");
        assert_eq!(scripts[0].file_type.as_deref(), Some("powershell"));
    }

    #[tokio::test]
    async fn listing_without_items_is_a_shape_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
            .mount(&server)
            .await;

        let client = ApiClient::from_parts(&server.uri(), "token").unwrap();
        assert!(matches!(
            list_scripts(&client).await,
            Err(Error::ResponseShape(_))
        ));
    }

    #[tokio::test]
    async fn script_upload_accepts_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3.0/response/customScripts"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("audit.ps1");
        std::fs::write(&script, "Write-Output 'ok'").unwrap();

        let client = ApiClient::from_parts(&server.uri(), "token").unwrap();
        upload_script(&client, &script, "audit.ps1", "powershell", "audit helper")
            .await
            .unwrap();
    }
}
