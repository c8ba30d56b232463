//! Onboarding: a tenant submits its Jira connection details.

use crate::fields::string_field;
use credential_storage::{CredentialBundle, CredentialStore};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

const MISSING_FIELDS: &str = "Missing required fields: instanceUrl, email, and apiToken are required";

fn rejected(error: impl Into<String>) -> Value {
    json!({ "status": "error", "error": error.into() })
}

/// Validate an onboarding submission and persist it under `tenant`.
///
/// Always returns the reply to send; failures are reported in the reply
/// rather than as errors.
pub fn handle_onboarding(store: &CredentialStore, tenant: &str, payload: &[u8]) -> Value {
    let fields = match serde_json::from_slice::<Map<String, Value>>(payload) {
        Ok(fields) => fields,
        Err(e) => {
            warn!(tenant = %tenant, error = %e, "Invalid onboarding payload");
            return rejected("Invalid request data");
        }
    };

    let bundle = CredentialBundle::new(
        string_field(&fields, "instanceUrl"),
        string_field(&fields, "email"),
        string_field(&fields, "apiToken"),
    );
    if !bundle.is_complete() {
        warn!(tenant = %tenant, missing = ?bundle.missing_fields(), "Onboarding rejected");
        return rejected(MISSING_FIELDS);
    }

    if let Err(e) = store.save(tenant, bundle) {
        warn!(tenant = %tenant, error = %e, "Failed to save credentials");
        return rejected(format!("Failed to save credentials: {e}"));
    }

    info!(tenant = %tenant, "Credentials saved");
    json!({ "status": "accepted", "message": "Credentials saved successfully" })
}
