//! Action outcomes and their wire shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Failure categories reported to callers in the `error` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    CredentialsNotConfigured,
    CredentialsError,
    ValidationError,
    JiraApiError,
    InternalError,
    UnknownAction,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::CredentialsNotConfigured => "credentials_not_configured",
            Self::CredentialsError => "credentials_error",
            Self::ValidationError => "validation_error",
            Self::JiraApiError => "jira_api_error",
            Self::InternalError => "internal_error",
            Self::UnknownAction => "unknown_action",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running an action.
///
/// On the wire a success is its payload map and a failure is
/// `{"error": <kind>, "message": ..., ...context}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Success(Map<String, Value>),
    Failure {
        kind: ErrorKind,
        message: String,
        context: Map<String, Value>,
    },
}

impl ActionOutcome {
    pub fn success(payload: Map<String, Value>) -> Self {
        Self::Success(payload)
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
            context: Map::new(),
        }
    }

    /// Attach an extra field to a failure. Successes are returned unchanged.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Self::Failure { context, .. } = &mut self {
            context.insert(key.into(), value.into());
        }
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Failure kind, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Legacy wire representation.
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Success(payload) => Value::Object(payload.clone()),
            Self::Failure {
                kind,
                message,
                context,
            } => {
                let mut wire = Map::new();
                wire.insert("error".into(), Value::String(kind.as_str().to_string()));
                wire.insert("message".into(), Value::String(message.clone()));
                for (key, value) in context {
                    if key != "error" && key != "message" {
                        wire.insert(key.clone(), value.clone());
                    }
                }
                Value::Object(wire)
            }
        }
    }

    /// Wire representation as bytes.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.to_wire())
    }
}
