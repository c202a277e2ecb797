//! HTTP client for the endpoint-security platform API
//!
//! Thin wrapper over `reqwest` that owns the tenant's base URL and bearer token and
//! normalizes the platform's status-code conventions into [`ApiBody`]. Everything
//! above this layer works with parsed JSON; everything below is plain HTTP.

use crate::error::{Error, Result};
use crate::tenants::Tenant;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

/// Parsed API response body
///
/// Distinguishes "the call succeeded with no content" (204, or an empty 2xx body)
/// from a failed request, which is an [`Error::Transport`] instead.
#[derive(Clone, Debug, PartialEq)]
pub enum ApiBody {
    /// Parsed JSON payload
    Json(Value),
    /// Successful response without a body
    NoContent,
}

impl ApiBody {
    /// The JSON payload, or a response-shape error if the call returned no content
    pub fn into_json(self) -> Result<Value> {
        match self {
            ApiBody::Json(value) => Ok(value),
            ApiBody::NoContent => Err(Error::ResponseShape(
                "expected a JSON body, got no content".to_string(),
            )),
        }
    }
}

/// Authenticated client for one tenant
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl ApiClient {
    /// Build a client from a tenant record
    pub fn new(tenant: &Tenant) -> Result<Self> {
        Self::from_parts(&tenant.base_url, &tenant.api_key)
    }

    /// Build a client from a raw base URL and bearer token
    pub fn from_parts(base_url: &str, token: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| Error::Config {
            message: format!("invalid base URL {base_url:?}: {e}"),
            key: Some("base_url".to_string()),
        })?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.to_string(),
        })
    }

    /// The underlying `reqwest` client, for requests outside the tenant API
    /// (artifact downloads use pre-signed absolute URLs without the bearer token)
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| Error::Config {
            message: format!("invalid endpoint path {path:?}: {e}"),
            key: None,
        })
    }

    /// GET with optional query parameters
    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<ApiBody> {
        let mut url = self.endpoint(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().copied());
        }
        debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;
        Self::map_response(response).await
    }

    /// POST a JSON body
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<ApiBody> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST json");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        Self::map_response(response).await
    }

    /// POST a multipart form (script uploads). Content-Type is left to reqwest.
    pub async fn post_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<ApiBody> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST multipart");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;
        Self::map_response(response).await
    }

    /// Map platform status conventions: 200/201/202/207 carry JSON (or nothing),
    /// 204 is an explicit no-content success, anything else is a transport failure.
    async fn map_response(response: reqwest::Response) -> Result<ApiBody> {
        let status = response.status();
        match status.as_u16() {
            200 | 201 | 202 | 207 => {
                let text = response.text().await?;
                if text.is_empty() {
                    return Ok(ApiBody::NoContent);
                }
                match serde_json::from_str(&text) {
                    Ok(value) => Ok(ApiBody::Json(value)),
                    Err(e) => Err(Error::ResponseShape(format!(
                        "status {status} body is not valid JSON: {e}"
                    ))),
                }
            }
            204 => Ok(ApiBody::NoContent),
            code => {
                let text = response.text().await.unwrap_or_default();
                warn!(status = code, body = %text, "API request rejected");
                Err(Error::Transport {
                    message: format!("API error ({code}): {text}"),
                    status: Some(code),
                })
            }
        }
    }
}
