//! Issue actions: create, delete and comment.
//!
//! All three run behind the handshake protocol. Validation happens before a
//! client is built, so a rejected request never touches the network.

use crate::fields::{bool_field, collect_additional_fields, object_field, string_field};
use jira_client::{is_issue_ref, AddCommentRequest, ApiResult, CreateIssueRequest, JiraClient};
use plugin_bus::{ActionContext, ActionDescriptor, ActionForm, ActionOutcome, ErrorKind, ResponseProtocol};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

pub const CREATE_ISSUE: &str = "issues.create";
pub const DELETE_ISSUE: &str = "issues.delete";
pub const ADD_COMMENT: &str = "issues.comment";

const CREATE_KNOWN_FIELDS: &[&str] = &[
    "projectKey",
    "issueType",
    "summary",
    "description",
    "additionalFields",
];

const COMMENT_KNOWN_FIELDS: &[&str] = &["issueKey", "commentBody", "visibility", "additionalFields"];

pub fn actions() -> Vec<ActionDescriptor> {
    vec![
        ActionDescriptor::new(
            CREATE_ISSUE,
            "Create Issue",
            "Create a new issue in Jira",
            ResponseProtocol::Handshake,
            create_issue_form(),
            create_issue,
        ),
        ActionDescriptor::new(
            DELETE_ISSUE,
            "Delete Issue",
            "Delete an issue from Jira by issue key or ID",
            ResponseProtocol::Handshake,
            delete_issue_form(),
            delete_issue,
        ),
        ActionDescriptor::new(
            ADD_COMMENT,
            "Add Comment",
            "Add a comment to a Jira issue",
            ResponseProtocol::Handshake,
            add_comment_form(),
            add_comment,
        ),
    ]
}

fn validation_error(message: &str) -> ActionOutcome {
    ActionOutcome::failure(ErrorKind::ValidationError, message)
}

/// Empty or malformed issue references never reach the API.
fn check_issue_ref(issue_key: &str) -> Option<ActionOutcome> {
    if issue_key.is_empty() {
        return Some(validation_error("Issue key or ID is required"));
    }
    if !is_issue_ref(issue_key) {
        return Some(ActionOutcome::failure(
            ErrorKind::ValidationError,
            format!("Invalid issue key or ID: {issue_key}"),
        ));
    }
    None
}

fn remote_failure(ctx: &ActionContext, action: &str, prefix: &str, err: impl std::fmt::Display) -> ActionOutcome {
    warn!(tenant = %ctx.tenant, action, error = %err, "Jira request failed");
    ActionOutcome::failure(ErrorKind::JiraApiError, format!("{prefix}: {err}"))
}

fn success(message: String) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("result".into(), json!("success"));
    payload.insert("message".into(), json!(message));
    payload
}

/// `issues.create`
pub async fn create_issue(ctx: ActionContext) -> ActionOutcome {
    let body = &ctx.body;
    let project_key = string_field(body, "projectKey");
    let issue_type = string_field(body, "issueType");
    let summary = string_field(body, "summary");

    if project_key.is_empty() {
        return validation_error("Project key is required");
    }
    if issue_type.is_empty() {
        return validation_error("Issue type is required");
    }
    if summary.is_empty() {
        return validation_error("Summary is required");
    }

    let mut request = CreateIssueRequest::new(project_key, issue_type, summary);
    let description = string_field(body, "description");
    if !description.is_empty() {
        request.description = Some(description.to_string());
    }
    request.additional_fields = collect_additional_fields(body, CREATE_KNOWN_FIELDS);

    let result: ApiResult<Map<String, Value>> = match JiraClient::new(&ctx.credentials) {
        Ok(client) => client.create_issue(&request).await,
        Err(e) => Err(e),
    };
    let issue = match result {
        Ok(issue) => issue,
        Err(e) => return remote_failure(&ctx, CREATE_ISSUE, "Failed to create issue", e),
    };

    let issue_key = issue.get("key").cloned().unwrap_or(Value::Null);
    let issue_id = issue.get("id").cloned().unwrap_or(Value::Null);
    info!(tenant = %ctx.tenant, issue_key = %issue_key, "Issue created");

    let mut payload = success("Issue created successfully".to_string());
    payload.insert("issueKey".into(), issue_key);
    payload.insert("issueId".into(), issue_id);
    payload.insert("issue".into(), Value::Object(issue));
    ActionOutcome::success(payload)
}

/// `issues.delete`
pub async fn delete_issue(ctx: ActionContext) -> ActionOutcome {
    let issue_key = string_field(&ctx.body, "issueKey").to_string();
    if let Some(rejected) = check_issue_ref(&issue_key) {
        return rejected;
    }
    let delete_subtasks = bool_field(&ctx.body, "deleteSubtasks");

    let result = match JiraClient::new(&ctx.credentials) {
        Ok(client) => client.delete_issue(&issue_key, delete_subtasks).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        return remote_failure(&ctx, DELETE_ISSUE, "Failed to delete issue", e);
    }

    info!(tenant = %ctx.tenant, issue_key = %issue_key, delete_subtasks, "Issue deleted");
    let mut payload = success(format!("Issue {issue_key} deleted successfully"));
    payload.insert("issueKey".into(), json!(issue_key));
    ActionOutcome::success(payload)
}

/// `issues.comment`
pub async fn add_comment(ctx: ActionContext) -> ActionOutcome {
    let body = &ctx.body;
    let issue_key = string_field(body, "issueKey");
    let comment_body = string_field(body, "commentBody");

    if let Some(rejected) = check_issue_ref(issue_key) {
        return rejected;
    }
    if comment_body.is_empty() {
        return validation_error("Comment body is required");
    }

    let mut request = AddCommentRequest::new(issue_key, comment_body);
    request.visibility = object_field(body, "visibility");
    request.additional_fields = collect_additional_fields(body, COMMENT_KNOWN_FIELDS);

    let result = match JiraClient::new(&ctx.credentials) {
        Ok(client) => client.add_comment(&request).await,
        Err(e) => Err(e),
    };
    let comment = match result {
        Ok(comment) => comment,
        Err(e) => return remote_failure(&ctx, ADD_COMMENT, "Failed to add comment", e),
    };

    let comment_id = comment.get("id").cloned().unwrap_or(Value::Null);
    let author = comment
        .get("author")
        .filter(|author| author.is_object())
        .cloned()
        .unwrap_or(Value::Null);
    info!(tenant = %ctx.tenant, issue_key = %request.issue_key, comment_id = %comment_id, "Comment added");

    let mut payload = success(format!(
        "Comment added successfully to issue {}",
        request.issue_key
    ));
    payload.insert("issueKey".into(), json!(request.issue_key));
    payload.insert("commentId".into(), comment_id);
    payload.insert("comment".into(), Value::Object(comment));
    payload.insert("commentAuthor".into(), author);
    ActionOutcome::success(payload)
}

fn create_issue_form() -> ActionForm {
    ActionForm::new(
        json!({
            "type": "VerticalLayout",
            "elements": [
                { "type": "Control", "scope": "#/properties/projectKey" },
                { "type": "Control", "scope": "#/properties/issueType" },
                { "type": "Control", "scope": "#/properties/summary" },
                { "type": "Control", "scope": "#/properties/description" },
                {
                    "type": "Control",
                    "scope": "#/properties/additionalFields",
                    "options": { "format": "json" }
                }
            ]
        }),
        json!({
            "type": "object",
            "properties": {
                "projectKey": {
                    "type": "string",
                    "title": "Project Key",
                    "description": "The project key (e.g., PROJ)"
                },
                "issueType": {
                    "type": "string",
                    "title": "Issue Type",
                    "description": "Type of issue (e.g., Task, Bug, Story)",
                    "enum": ["Task", "Bug", "Story", "Epic"]
                },
                "summary": {
                    "type": "string",
                    "title": "Summary",
                    "description": "Issue summary/title"
                },
                "description": {
                    "type": "string",
                    "title": "Description",
                    "description": "Issue description"
                },
                "additionalFields": {
                    "type": "object",
                    "title": "Additional Fields",
                    "description": "Any other Jira fields to set on the issue, keyed by field id (e.g., {\"priority\": {\"name\": \"High\"}, \"labels\": [\"backend\"], \"customfield_10010\": \"value\"})",
                    "additionalProperties": true
                }
            },
            "required": ["projectKey", "issueType", "summary"],
            "additionalProperties": true
        }),
    )
}

fn delete_issue_form() -> ActionForm {
    ActionForm::new(
        json!({
            "type": "VerticalLayout",
            "elements": [
                { "type": "Control", "scope": "#/properties/issueKey" },
                { "type": "Control", "scope": "#/properties/deleteSubtasks" }
            ]
        }),
        json!({
            "type": "object",
            "properties": {
                "issueKey": {
                    "type": "string",
                    "title": "Issue Key or ID",
                    "description": "The issue key (e.g., COM-123) or issue ID"
                },
                "deleteSubtasks": {
                    "type": "boolean",
                    "title": "Delete Subtasks",
                    "description": "If true, delete subtasks when deleting the issue",
                    "default": false
                }
            },
            "required": ["issueKey"]
        }),
    )
}

fn add_comment_form() -> ActionForm {
    ActionForm::new(
        json!({
            "type": "VerticalLayout",
            "elements": [
                { "type": "Control", "scope": "#/properties/issueKey" },
                { "type": "Control", "scope": "#/properties/commentBody" },
                { "type": "Control", "scope": "#/properties/visibility" },
                {
                    "type": "Control",
                    "scope": "#/properties/additionalFields",
                    "options": { "format": "json" }
                }
            ]
        }),
        json!({
            "type": "object",
            "properties": {
                "issueKey": {
                    "type": "string",
                    "title": "Issue Key or ID",
                    "description": "The issue key (e.g., COM-123) or issue ID"
                },
                "commentBody": {
                    "type": "string",
                    "title": "Comment",
                    "description": "The comment text to add",
                    "format": "textarea"
                },
                "visibility": {
                    "type": "object",
                    "title": "Visibility (Optional)",
                    "description": "Restrict who can see the comment (e.g., {\"type\": \"role\", \"value\": \"Administrators\"})",
                    "properties": {
                        "type": {
                            "type": "string",
                            "title": "Visibility Type",
                            "enum": ["role", "group"]
                        },
                        "value": {
                            "type": "string",
                            "title": "Visibility Value",
                            "description": "Role or group name"
                        }
                    }
                },
                "additionalFields": {
                    "type": "object",
                    "title": "Additional Fields",
                    "description": "Extra comment properties passed through to Jira",
                    "additionalProperties": true
                }
            },
            "required": ["issueKey", "commentBody"],
            "additionalProperties": true
        }),
    )
}
