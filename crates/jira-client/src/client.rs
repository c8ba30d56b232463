//! Authenticated Jira REST client.

use crate::error::{synthesize_error_message, ApiResult, FieldErrorLabel, RemoteApiError};
use crate::requests::{AddCommentRequest, CreateIssueRequest};
use credential_storage::CredentialBundle;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound for any single Jira call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response bodies shorter than this are logged at debug level.
const LOGGABLE_BODY_LEN: usize = 1000;

/// Jira REST API client bound to one tenant's credentials.
#[derive(Clone)]
pub struct JiraClient {
    http_client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl std::fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Raw outcome of one HTTP exchange.
struct RawResponse {
    status: StatusCode,
    body: String,
}

impl JiraClient {
    /// Create a client for the tenant described by `bundle`.
    pub fn new(bundle: &CredentialBundle) -> ApiResult<Self> {
        Self::with_timeout(bundle, REQUEST_TIMEOUT)
    }

    pub(crate) fn with_timeout(bundle: &CredentialBundle, timeout: Duration) -> ApiResult<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: bundle.instance_url.trim_end_matches('/').to_string(),
            api_token: bundle.api_token.clone(),
        })
    }

    /// Base URL requests are sent to, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    async fn send(&self, method: Method, endpoint: &str, body: Option<&Value>) -> ApiResult<RawResponse> {
        let url = self.url(endpoint);
        debug!(method = %method, url = %url, "Making Jira API request");

        let mut request = self
            .http_client
            .request(method, &url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Jira API request failed");
            RemoteApiError::from(e)
        })?;

        let status = response.status();
        let body = response.text().await?;

        debug!(status = status.as_u16(), body_len = body.len(), "Jira API response");
        if !body.is_empty() && body.len() < LOGGABLE_BODY_LEN {
            debug!(body = %body, "Jira API response body");
        }

        Ok(RawResponse { status, body })
    }

    fn ensure_status(
        raw: &RawResponse,
        accepted: &[StatusCode],
        label: FieldErrorLabel,
    ) -> ApiResult<()> {
        if accepted.contains(&raw.status) {
            return Ok(());
        }
        Err(RemoteApiError::Status {
            status: raw.status.as_u16(),
            message: synthesize_error_message(&raw.body, label),
        })
    }

    fn decode<T: DeserializeOwned>(raw: &RawResponse) -> ApiResult<T> {
        serde_json::from_str(&raw.body).map_err(|e| RemoteApiError::Decode {
            status: raw.status.as_u16(),
            message: e.to_string(),
        })
    }

    /// `GET /rest/api/2/project`
    pub async fn list_projects(&self) -> ApiResult<Vec<Value>> {
        let raw = self.send(Method::GET, "/rest/api/2/project", None).await?;
        Self::ensure_status(&raw, &[StatusCode::OK], FieldErrorLabel::Generic)?;

        let projects: Vec<Value> = Self::decode(&raw)?;
        info!(count = projects.len(), "Fetched Jira projects");
        Ok(projects)
    }

    /// `POST /rest/api/2/issue`. Returns the created issue (`id`, `key`, `self`).
    pub async fn create_issue(&self, request: &CreateIssueRequest) -> ApiResult<Map<String, Value>> {
        let body = request.to_body();
        let raw = self
            .send(Method::POST, "/rest/api/2/issue", Some(&body))
            .await?;
        Self::ensure_status(&raw, &[StatusCode::CREATED], FieldErrorLabel::MissingOrInvalid)?;

        let issue: Map<String, Value> = Self::decode(&raw)?;
        let issue_key = issue.get("key").and_then(|key| key.as_str()).unwrap_or_default();
        info!(project = %request.project_key, issue_key, "Created Jira issue");
        Ok(issue)
    }

    /// `DELETE /rest/api/2/issue/{key}`, optionally with its subtasks.
    pub async fn delete_issue(&self, issue_key: &str, delete_subtasks: bool) -> ApiResult<()> {
        let mut endpoint = issue_path(issue_key, "")?;
        if delete_subtasks {
            endpoint.push_str("?deleteSubtasks=true");
        }

        let raw = self.send(Method::DELETE, &endpoint, None).await?;
        Self::ensure_status(
            &raw,
            &[StatusCode::NO_CONTENT, StatusCode::OK],
            FieldErrorLabel::Generic,
        )?;

        info!(issue_key = %issue_key, delete_subtasks, "Deleted Jira issue");
        Ok(())
    }

    /// `POST /rest/api/2/issue/{key}/comment`. Returns the created comment.
    pub async fn add_comment(&self, request: &AddCommentRequest) -> ApiResult<Map<String, Value>> {
        let endpoint = issue_path(&request.issue_key, "/comment")?;
        let body = request.to_body();
        let raw = self.send(Method::POST, &endpoint, Some(&body)).await?;
        Self::ensure_status(&raw, &[StatusCode::CREATED], FieldErrorLabel::Generic)?;

        let comment: Map<String, Value> = Self::decode(&raw)?;
        info!(issue_key = %request.issue_key, "Added comment to Jira issue");
        Ok(comment)
    }
}

/// `/rest/api/2/issue/{key}{suffix}` with the key escaped as one path segment.
fn issue_path(issue_key: &str, suffix: &str) -> ApiResult<String> {
    // Dot segments survive escaping and would be resolved by the URL parser.
    if issue_key.is_empty() || issue_key == "." || issue_key == ".." {
        return Err(RemoteApiError::InvalidIssueRef(issue_key.to_string()));
    }
    Ok(format!(
        "/rest/api/2/issue/{}{suffix}",
        urlencoding::encode(issue_key)
    ))
}
