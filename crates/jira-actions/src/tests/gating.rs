//! Requests that must never reach the remote API.

use super::harness::{next_json, Plugin, JOB_PREFIX};
use httpmock::prelude::*;
use plugin_bus::MessageBus;
use serde_json::json;

#[tokio::test]
async fn missing_summary_is_rejected_without_remote_call() {
    let jira = MockServer::start();
    let create = jira.mock(|when, then| {
        when.method(POST).path("/rest/api/2/issue");
        then.status(201).json_body(json!({ "id": "1", "key": "P-1" }));
    });

    let plugin = Plugin::start().await;
    plugin.configure("S1", &jira.base_url());
    let (inbox, mut replies) = plugin.inbox("validation").await;
    let mut jobs = plugin.bus.subscribe(&format!("{JOB_PREFIX}.>")).await.unwrap();

    plugin
        .send(
            "S1",
            "issues.create",
            br#"{"body":{"projectKey":"P","issueType":"Task"}}"#,
            &inbox,
        )
        .await;

    next_json(&mut replies).await;
    let completion = next_json(&mut jobs).await;
    assert_eq!(
        completion["result"],
        json!({ "error": "validation_error", "message": "Summary is required" })
    );
    create.assert_calls(0);

    plugin.stop().await;
}

#[tokio::test]
async fn unconfigured_tenant_never_calls_remote() {
    let jira = MockServer::start();
    let list = jira.mock(|when, then| {
        when.method(GET).path("/rest/api/2/project");
        then.status(200).json_body(json!([]));
    });

    let plugin = Plugin::start().await;
    plugin.configure("S1", &jira.base_url());
    let (inbox, mut replies) = plugin.inbox("unconfigured").await;

    plugin.send("S2", "projects.list", b"", &inbox).await;

    let reply = next_json(&mut replies).await;
    assert_eq!(reply["error"], "credentials_not_configured");
    assert_eq!(reply["spaceId"], "S2");
    list.assert_calls(0);

    plugin.stop().await;
}

#[tokio::test]
async fn unknown_method_is_reported() {
    let plugin = Plugin::start().await;
    let (inbox, mut replies) = plugin.inbox("unknown").await;

    plugin.send("S1", "issues.transition", b"", &inbox).await;

    assert_eq!(
        next_json(&mut replies).await,
        json!({ "error": "unknown_action", "message": "Unknown action: issues.transition" })
    );

    plugin.stop().await;
}
