//! Credential bundle and tenant key types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reserved key used when a request carries no tenant identifier.
pub const DEFAULT_TENANT_KEY: &str = "default";

/// Map an extracted tenant identifier to its storage key.
///
/// An empty identifier maps to [`DEFAULT_TENANT_KEY`].
pub fn tenant_key(tenant_id: &str) -> &str {
    if tenant_id.is_empty() {
        DEFAULT_TENANT_KEY
    } else {
        tenant_id
    }
}

/// Jira credentials for one tenant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialBundle {
    /// Jira instance base URL, e.g. `https://yourcompany.atlassian.net`
    pub instance_url: String,
    /// Jira account email
    pub email: String,
    /// Jira API token
    pub api_token: String,
}

impl CredentialBundle {
    pub fn new(
        instance_url: impl Into<String>,
        email: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            instance_url: instance_url.into(),
            email: email.into(),
            api_token: api_token.into(),
        }
    }

    /// Names of required fields that are empty, in wire order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.instance_url.is_empty() {
            missing.push("instanceUrl");
        }
        if self.email.is_empty() {
            missing.push("email");
        }
        if self.api_token.is_empty() {
            missing.push("apiToken");
        }
        missing
    }

    /// True when every required field is set.
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("instance_url", &self.instance_url)
            .field("email", &self.email)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

/// Tenant key to bundle. The unit of durable state.
pub type CredentialCollection = BTreeMap<String, CredentialBundle>;
