//! Remote API error type and Jira error body normalization.

use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Failure of a Jira REST call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteApiError {
    /// Jira answered with a non-success status
    #[error("Jira API error (status {status}): {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (connect failure, timeout, ...)
    #[error("request failed: {0}")]
    Transport(String),

    /// Jira answered with success but the body was not the expected JSON
    #[error("failed to decode response (status {status}): {message}")]
    Decode { status: u16, message: String },

    /// The issue reference cannot be placed in a request path
    #[error("invalid issue key or ID: {0:?}")]
    InvalidIssueRef(String),
}

impl RemoteApiError {
    /// HTTP status, absent for transport failures.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::Decode { status, .. } => Some(*status),
            Self::Transport(_) | Self::InvalidIssueRef(_) => None,
        }
    }

    /// Human readable cause without the status prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Status { message, .. } | Self::Decode { message, .. } => message,
            Self::Transport(message) | Self::InvalidIssueRef(message) => message,
        }
    }
}

impl From<reqwest::Error> for RemoteApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Result type for Jira calls.
pub type ApiResult<T> = Result<T, RemoteApiError>;

/// Label placed before field errors in a synthesized message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldErrorLabel {
    /// Issue creation, where field errors mean bad input
    MissingOrInvalid,
    /// Every other call
    Generic,
}

impl FieldErrorLabel {
    fn as_str(self) -> &'static str {
        match self {
            Self::MissingOrInvalid => "Missing or invalid fields",
            Self::Generic => "Errors",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraErrorBody {
    #[serde(default)]
    error_messages: Vec<String>,
    #[serde(default)]
    errors: BTreeMap<String, String>,
}

/// Build a readable message from a Jira error body.
///
/// Error messages come first, then `"<label>: f1: m1; f2: m2"` with fields in
/// name order, joined by `". "`. Bodies that are not Jira error JSON, or that
/// carry nothing, are returned unchanged.
pub(crate) fn synthesize_error_message(body: &str, label: FieldErrorLabel) -> String {
    let Ok(parsed) = serde_json::from_str::<JiraErrorBody>(body) else {
        return body.to_string();
    };

    let mut parts = parsed.error_messages;
    if !parsed.errors.is_empty() {
        let fields = parsed
            .errors
            .iter()
            .map(|(field, msg)| format!("{field}: {msg}"))
            .collect::<Vec<_>>()
            .join("; ");
        parts.push(format!("{}: {}", label.as_str(), fields));
    }

    if parts.is_empty() {
        body.to_string()
    } else {
        parts.join(". ")
    }
}
