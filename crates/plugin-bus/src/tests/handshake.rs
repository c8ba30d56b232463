//! Handshake protocol.
//!
//! The ack `{jobId, progress: 0}` is delivered before the business function
//! starts, and the completion is published retained on the job channel.

use super::harness::{
    echo_action, failing_action, next_json, settings, slow_action, CallCounter, Fixture, JOB_PREFIX,
};
use crate::{DispatchSettings, InboundMessage, MessageBus, ResponseProtocol};
use futures_util::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn ack_arrives_before_completion() {
    let fx = Fixture::new();
    fx.configure("S1");
    let finished = Arc::new(parking_lot::Mutex::new(None));
    let action = slow_action("issues.create", Duration::from_millis(200), finished.clone());
    let (inbox, mut replies) = fx.inbox("ack-order").await;
    let mut jobs = fx.bus.subscribe(&format!("{JOB_PREFIX}.>")).await.unwrap();

    let dispatcher = fx.dispatcher.clone();
    let msg = fx.message("S1", "issues.create", br#"{"body":{}}"#, &inbox);
    let run = tokio::spawn(async move { dispatcher.dispatch(&action, &msg).await });

    let ack = next_json(&mut replies).await;
    let ack_at = Instant::now();
    assert_eq!(ack["progress"], 0);
    let job_id = ack["jobId"].as_str().unwrap().to_string();
    assert!(finished.lock().is_none(), "handler finished before the ack was observed");

    let completion = next_json(&mut jobs).await;
    let finished_at = finished.lock().expect("handler finished");
    assert!(ack_at <= finished_at);
    assert_eq!(completion["jobId"], job_id);
    assert_eq!(completion["entityId"], "S1");
    assert_eq!(completion["progress"], 100);
    assert_eq!(completion["status"], "completed");
    assert_eq!(completion["result"], json!({ "result": "success" }));

    let report = run.await.unwrap();
    assert_eq!(report.job_id.as_deref(), Some(job_id.as_str()));
}

#[tokio::test]
async fn completion_is_retained_for_late_subscribers() {
    let fx = Fixture::new();
    fx.configure("S1");
    let action = echo_action("issues.delete", ResponseProtocol::Handshake, CallCounter::default());
    let (inbox, mut replies) = fx.inbox("late").await;

    let report = fx
        .dispatcher
        .dispatch(&action, &fx.message("S1", "issues.delete", b"", &inbox))
        .await;
    let job_id = report.job_id.unwrap();
    assert_eq!(next_json(&mut replies).await["jobId"], job_id.as_str());

    // Subscribe only after the job finished.
    let mut late = fx
        .bus
        .subscribe(&format!("{JOB_PREFIX}.{job_id}"))
        .await
        .unwrap();
    let completion = next_json(&mut late).await;
    assert_eq!(completion["status"], "completed");
    assert_eq!(completion["jobId"], job_id.as_str());
}

#[tokio::test]
async fn failed_outcome_completes_with_failed_status() {
    let fx = Fixture::new();
    fx.configure("S1");
    let action = failing_action("issues.create");
    let (inbox, _replies) = fx.inbox("failed").await;

    let report = fx
        .dispatcher
        .dispatch(&action, &fx.message("S1", "issues.create", b"", &inbox))
        .await;
    let channel = format!("{JOB_PREFIX}.{}", report.job_id.unwrap());

    let retained = fx.bus.retained(&channel).expect("completion retained");
    let completion: serde_json::Value = serde_json::from_slice(&retained).unwrap();
    assert_eq!(completion["status"], "failed");
    assert_eq!(
        completion["result"],
        json!({ "error": "validation_error", "message": "Summary is required" })
    );
}

#[tokio::test]
async fn job_is_consumed_on_completion() {
    let fx = Fixture::new();
    fx.configure("S1");
    let action = echo_action("issues.comment", ResponseProtocol::Handshake, CallCounter::default());
    let (inbox, _replies) = fx.inbox("consumed").await;

    let report = fx
        .dispatcher
        .dispatch(&action, &fx.message("S1", "issues.comment", b"", &inbox))
        .await;

    let job_id = report.job_id.unwrap();
    assert_eq!(fx.dispatcher.jobs().pending(), 0);
    assert_eq!(fx.dispatcher.jobs().complete(&job_id), None);
}

#[tokio::test]
async fn panicking_handler_does_not_leak_its_job() {
    let fx = Fixture::new();
    fx.configure("S1");
    let action = crate::ActionDescriptor::new(
        "issues.create",
        "Panics",
        "Panics while executing",
        ResponseProtocol::Handshake,
        crate::ActionForm::empty(),
        |_ctx: crate::ActionContext| async {
            if true {
                panic!("handler crashed");
            }
            crate::ActionOutcome::failure(crate::ErrorKind::InternalError, "unreachable")
        },
    );
    let (inbox, mut replies) = fx.inbox("panicking").await;

    let dispatcher = fx.dispatcher.clone();
    let msg = fx.message("S1", "issues.create", b"", &inbox);
    let run = tokio::spawn(async move { dispatcher.dispatch(&action, &msg).await });

    let ack = next_json(&mut replies).await;
    assert!(ack["jobId"].is_string());
    assert!(run.await.unwrap_err().is_panic());
    assert_eq!(fx.dispatcher.jobs().pending(), 0);
}

#[tokio::test]
async fn handshake_without_reply_address_still_completes() {
    let fx = Fixture::new();
    fx.configure("S1");
    let calls = CallCounter::default();
    let action = echo_action("issues.create", ResponseProtocol::Handshake, calls.clone());
    let mut jobs = fx.bus.subscribe(&format!("{JOB_PREFIX}.>")).await.unwrap();

    let msg = InboundMessage::new(super::harness::subject("S1", "issues.create"), b"".to_vec());
    let report = fx.dispatcher.dispatch(&action, &msg).await;

    assert_eq!(calls.count(), 1);
    let completion = next_json(&mut jobs).await;
    assert_eq!(completion["jobId"], report.job_id.unwrap().as_str());
}

#[tokio::test]
async fn compatibility_delay_runs_between_ack_and_execution() {
    let fx = Fixture::with_settings(DispatchSettings {
        handshake_delay: Duration::from_millis(150),
        ..settings()
    });
    fx.configure("S1");
    let calls = CallCounter::default();
    let action = echo_action("issues.create", ResponseProtocol::Handshake, calls.clone());
    let (inbox, mut replies) = fx.inbox("delay").await;

    let dispatcher = fx.dispatcher.clone();
    let msg = fx.message("S1", "issues.create", b"", &inbox);
    let started = Instant::now();
    let run = tokio::spawn(async move { dispatcher.dispatch(&action, &msg).await });

    next_json(&mut replies).await;
    assert_eq!(calls.count(), 0);

    run.await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert_eq!(calls.count(), 1);
}

#[tokio::test]
async fn each_request_gets_its_own_job() {
    let fx = Fixture::new();
    fx.configure("S1");
    let action = echo_action("issues.create", ResponseProtocol::Handshake, CallCounter::default());
    let (inbox, mut replies) = fx.inbox("distinct").await;

    for _ in 0..3 {
        fx.dispatcher
            .dispatch(&action, &fx.message("S1", "issues.create", b"", &inbox))
            .await;
    }

    let mut ids = Vec::new();
    for _ in 0..3 {
        let msg = replies.next().await.unwrap();
        let ack: serde_json::Value = serde_json::from_slice(&msg.payload).unwrap();
        ids.push(ack["jobId"].as_str().unwrap().to_string());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}
