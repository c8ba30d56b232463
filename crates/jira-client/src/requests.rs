//! Request bodies for write operations.

use serde_json::{json, Map, Value};

/// Whether an extra field should be forwarded to Jira.
fn is_forwardable(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn merge_additional(target: &mut Map<String, Value>, additional: &Map<String, Value>) {
    for (key, value) in additional {
        if is_forwardable(value) {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Whether `reference` is a Jira issue key (`COM-123`) or a numeric issue ID.
pub fn is_issue_ref(reference: &str) -> bool {
    if !reference.is_empty() && reference.bytes().all(|b| b.is_ascii_digit()) {
        return true;
    }
    let Some((project, number)) = reference.rsplit_once('-') else {
        return false;
    };
    let mut project_chars = project.bytes();
    let starts_with_letter = project_chars.next().is_some_and(|b| b.is_ascii_alphabetic());
    starts_with_letter
        && project_chars.all(|b| b.is_ascii_alphanumeric() || b == b'_')
        && !number.is_empty()
        && number.bytes().all(|b| b.is_ascii_digit())
}

/// Input of `POST /rest/api/2/issue`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateIssueRequest {
    pub project_key: String,
    pub issue_type: String,
    pub summary: String,
    pub description: Option<String>,
    /// Extra Jira fields such as `duedate` or `assignee`.
    pub additional_fields: Map<String, Value>,
}

impl CreateIssueRequest {
    pub fn new(
        project_key: impl Into<String>,
        issue_type: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            project_key: project_key.into(),
            issue_type: issue_type.into(),
            summary: summary.into(),
            ..Self::default()
        }
    }

    /// JSON body Jira expects.
    pub fn to_body(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("project".into(), json!({ "key": self.project_key }));
        fields.insert("summary".into(), Value::String(self.summary.clone()));
        fields.insert("issuetype".into(), json!({ "name": self.issue_type }));
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            fields.insert("description".into(), Value::String(description.to_string()));
        }
        merge_additional(&mut fields, &self.additional_fields);

        json!({ "fields": fields })
    }
}

/// Input of `POST /rest/api/2/issue/{key}/comment`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddCommentRequest {
    pub issue_key: String,
    pub body: String,
    /// Restricts who can see the comment, e.g. `{"type": "role", "value": "Administrators"}`.
    pub visibility: Option<Map<String, Value>>,
    pub additional_fields: Map<String, Value>,
}

impl AddCommentRequest {
    pub fn new(issue_key: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            issue_key: issue_key.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("body".into(), Value::String(self.body.clone()));
        if let Some(visibility) = self.visibility.as_ref().filter(|v| !v.is_empty()) {
            body.insert("visibility".into(), Value::Object(visibility.clone()));
        }
        merge_additional(&mut body, &self.additional_fields);

        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_refs() {
        for valid in ["COM-123", "p-1", "ABC_2-10", "10001"] {
            assert!(is_issue_ref(valid), "{valid}");
        }
        for invalid in [
            "",
            "COM",
            "COM-",
            "-1",
            "1A-2",
            "P-1?deleteSubtasks=true",
            "../project",
            "P-1/comment",
            "P-1#x",
            "P%2D1",
            "..",
        ] {
            assert!(!is_issue_ref(invalid), "{invalid}");
        }
    }

    #[test]
    fn test_create_issue_body_shape() {
        let mut request = CreateIssueRequest::new("P", "Task", "s");
        request.description = Some("details".to_string());
        request
            .additional_fields
            .insert("duedate".into(), json!("2026-01-01"));
        request.additional_fields.insert("assignee".into(), Value::Null);
        request.additional_fields.insert("labels".into(), json!(""));

        assert_eq!(
            request.to_body(),
            json!({
                "fields": {
                    "project": { "key": "P" },
                    "summary": "s",
                    "issuetype": { "name": "Task" },
                    "description": "details",
                    "duedate": "2026-01-01"
                }
            })
        );
    }

    #[test]
    fn test_create_issue_skips_empty_description() {
        let mut request = CreateIssueRequest::new("P", "Bug", "s");
        request.description = Some(String::new());
        assert!(request.to_body()["fields"].get("description").is_none());
    }

    #[test]
    fn test_comment_body_with_visibility() {
        let mut request = AddCommentRequest::new("P-1", "hello");
        let mut visibility = Map::new();
        visibility.insert("type".into(), json!("role"));
        visibility.insert("value".into(), json!("Administrators"));
        request.visibility = Some(visibility);

        assert_eq!(
            request.to_body(),
            json!({
                "body": "hello",
                "visibility": { "type": "role", "value": "Administrators" }
            })
        );
    }

    #[test]
    fn test_comment_body_drops_empty_visibility() {
        let mut request = AddCommentRequest::new("P-1", "hello");
        request.visibility = Some(Map::new());
        assert_eq!(request.to_body(), json!({ "body": "hello" }));
    }
}
