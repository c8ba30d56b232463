//! Plugin intro: metadata, onboarding form, action list and per-tenant meta.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use credential_storage::CredentialStore;
use plugin_bus::ActionRegistry;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;

pub const PLUGIN_NAME: &str = "Jira Plugin";
pub const PLUGIN_VERSION: &str = "1.0.0";
pub const PLUGIN_AUTHOR: &str = "Soren Team";
pub const PLUGIN_SUMMARY: &str = "Jira integration for managing projects and issues";

/// Onboarding form presented before the first action can run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirements {
    /// Path the filled-in form is submitted to.
    pub reply_to: String,
    pub jsonui: Value,
    pub jsonschema: Value,
}

impl Requirements {
    pub fn credentials_form() -> Self {
        Self {
            reply_to: plugin_bus::server::ONBOARDING_PATH.to_string(),
            jsonui: json!({
                "type": "VerticalLayout",
                "elements": [
                    { "type": "Control", "scope": "#/properties/instanceUrl" },
                    { "type": "Control", "scope": "#/properties/email" },
                    { "type": "Control", "scope": "#/properties/apiToken" }
                ]
            }),
            jsonschema: json!({
                "type": "object",
                "properties": {
                    "instanceUrl": {
                        "type": "string",
                        "title": "Jira Instance URL",
                        "description": "Your Jira instance URL (e.g., https://yourcompany.atlassian.net)"
                    },
                    "email": {
                        "type": "string",
                        "title": "Email Address",
                        "description": "Your Jira account email address"
                    },
                    "apiToken": {
                        "type": "string",
                        "title": "API Token",
                        "description": "Your Jira API token (create one at https://id.atlassian.com/manage-profile/security/api-tokens)",
                        "format": "password"
                    }
                },
                "required": ["instanceUrl", "email", "apiToken"]
            }),
        }
    }
}

/// Tenant-specific part of the intro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntroMeta {
    pub credentials_configured: bool,
    pub space_id: String,
}

/// Intro reply.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginIntro {
    pub name: String,
    pub version: String,
    pub author: String,
    pub summary: String,
    pub icon_base64: String,
    pub requirements: Requirements,
    pub actions: Vec<Value>,
    pub meta: IntroMeta,
}

/// Builds intro replies. Everything but the meta block is computed once.
#[derive(Debug, Clone)]
pub struct IntroResponder {
    icon_base64: String,
    actions: Vec<Value>,
}

impl IntroResponder {
    pub fn new(registry: &ActionRegistry, icon_base64: String) -> Self {
        Self {
            icon_base64,
            actions: registry.iter().map(|action| action.summary()).collect(),
        }
    }

    /// Intro for `tenant`, reporting whether it has finished onboarding.
    pub fn intro(&self, store: &CredentialStore, tenant: &str) -> PluginIntro {
        PluginIntro {
            name: PLUGIN_NAME.to_string(),
            version: PLUGIN_VERSION.to_string(),
            author: PLUGIN_AUTHOR.to_string(),
            summary: PLUGIN_SUMMARY.to_string(),
            icon_base64: self.icon_base64.clone(),
            requirements: Requirements::credentials_form(),
            actions: self.actions.clone(),
            meta: IntroMeta {
                credentials_configured: store.exists(tenant),
                space_id: tenant.to_string(),
            },
        }
    }

    pub fn respond(&self, store: &CredentialStore, tenant: &str) -> Value {
        serde_json::to_value(self.intro(store, tenant)).unwrap_or(Value::Null)
    }
}

/// Base64 of the icon file, or an empty string when it cannot be read.
pub fn load_icon_base64(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => STANDARD.encode(bytes),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Plugin icon not available");
            String::new()
        }
    }
}
