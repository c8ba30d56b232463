//! Project actions.

use jira_client::JiraClient;
use plugin_bus::{ActionContext, ActionDescriptor, ActionForm, ActionOutcome, ErrorKind, ResponseProtocol};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

pub const LIST_PROJECTS: &str = "projects.list";

pub fn actions() -> Vec<ActionDescriptor> {
    vec![ActionDescriptor::new(
        LIST_PROJECTS,
        "List Projects",
        "Get a list of all projects in your Jira instance",
        ResponseProtocol::Direct,
        ActionForm::new(json!({}), json!({ "type": "object", "properties": {} })),
        list_projects,
    )]
}

/// `projects.list`: every project visible to the tenant's account.
pub async fn list_projects(ctx: ActionContext) -> ActionOutcome {
    let result = match JiraClient::new(&ctx.credentials) {
        Ok(client) => client.list_projects().await,
        Err(e) => Err(e),
    };

    let projects = match result {
        Ok(projects) => projects,
        Err(e) => {
            warn!(tenant = %ctx.tenant, error = %e, "Failed to list projects");
            return ActionOutcome::failure(
                ErrorKind::JiraApiError,
                format!("Failed to fetch projects: {e}"),
            );
        }
    };

    let count = projects.len();
    info!(tenant = %ctx.tenant, count, "Listed projects");

    let mut payload = Map::new();
    payload.insert("result".into(), json!("success"));
    payload.insert(
        "message".into(),
        json!(format!("Successfully retrieved {count} projects")),
    );
    payload.insert("projects".into(), Value::Array(projects));
    payload.insert("count".into(), json!(count));
    ActionOutcome::success(payload)
}
