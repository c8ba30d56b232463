//! Credential gating.
//!
//! A tenant without stored credentials never reaches execution and gets a
//! `credentials_not_configured` reply naming the action and the space.

use super::harness::{echo_action, next_json, CallCounter, Fixture};
use crate::{DispatchStage, ErrorKind, ResponseProtocol};
use credential_storage::{CredentialBackend, CredentialCollection, CredentialStore, StorageError, StorageResult};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn unconfigured_tenant_never_executes() {
    let fx = Fixture::new();
    let calls = CallCounter::default();
    let action = echo_action("issues.create", ResponseProtocol::Handshake, calls.clone());
    let (inbox, mut replies) = fx.inbox("unconfigured").await;

    let report = fx
        .dispatcher
        .dispatch(&action, &fx.message("S1", "issues.create", b"", &inbox))
        .await;

    assert_eq!(report.tenant, "S1");
    assert_eq!(report.stage, DispatchStage::BodyDecoded);
    assert!(!report.executed());
    assert_eq!(report.error, Some(ErrorKind::CredentialsNotConfigured));
    assert_eq!(report.job_id, None);
    assert_eq!(calls.count(), 0);

    assert_eq!(
        next_json(&mut replies).await,
        json!({
            "error": "credentials_not_configured",
            "message": "Jira credentials not configured for space 'S1'. Please complete the onboarding process first.",
            "action": "issues.create",
            "spaceId": "S1"
        })
    );
}

#[tokio::test]
async fn missing_tenant_segment_uses_default_credentials() {
    let fx = Fixture::new();
    let calls = CallCounter::default();
    let action = echo_action("projects.list", ResponseProtocol::Direct, calls.clone());
    let (inbox, mut replies) = fx.inbox("default").await;

    // No `bin` marker: tenant is empty and maps to the default key.
    let msg = crate::InboundMessage::new("soren.v2.jira.projects.list", b"".to_vec())
        .with_reply_to(inbox.clone());

    let report = fx.dispatcher.dispatch(&action, &msg).await;
    assert_eq!(report.error, Some(ErrorKind::CredentialsNotConfigured));
    let reply = next_json(&mut replies).await;
    assert_eq!(
        reply["message"],
        "Jira credentials not configured. Please complete the onboarding process first."
    );
    assert_eq!(reply["spaceId"], "");

    fx.configure("");
    let report = fx.dispatcher.dispatch(&action, &msg).await;
    assert!(report.executed());
    assert_eq!(report.error, None);
    assert_eq!(next_json(&mut replies).await["tenant"], "");
    assert_eq!(calls.count(), 1);
}

#[tokio::test]
async fn configured_tenant_receives_its_own_credentials() {
    let fx = Fixture::new();
    fx.configure("S1");
    fx.store
        .save(
            "S2",
            credential_storage::CredentialBundle::new("https://other.atlassian.net", "b@c.com", "t2"),
        )
        .unwrap();
    let action = echo_action("projects.list", ResponseProtocol::Direct, CallCounter::default());
    let (inbox, mut replies) = fx.inbox("own").await;

    let report = fx
        .dispatcher
        .dispatch(&action, &fx.message("S2", "projects.list", b"", &inbox))
        .await;

    assert_eq!(report.stage, DispatchStage::Executing);
    let reply = next_json(&mut replies).await;
    assert_eq!(reply["instanceUrl"], "https://other.atlassian.net");
    assert_eq!(reply["tenant"], "S2");
}

/// Backend whose reads fail after the first existence check succeeds.
struct FlakyBackend {
    loads: std::sync::atomic::AtomicUsize,
    collection: CredentialCollection,
}

impl CredentialBackend for FlakyBackend {
    fn load(&self) -> StorageResult<Option<CredentialCollection>> {
        let n = self.loads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if n == 0 {
            Ok(Some(self.collection.clone()))
        } else {
            Err(StorageError::Read {
                path: "/flaky/jira_credentials.json".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        }
    }

    fn store(&self, _collection: &CredentialCollection) -> StorageResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "flaky".to_string()
    }
}

#[tokio::test]
async fn credential_read_failure_is_credentials_error() {
    let mut collection = CredentialCollection::new();
    collection.insert("S1".into(), super::harness::bundle());
    let store = Arc::new(CredentialStore::new(Box::new(FlakyBackend {
        loads: Default::default(),
        collection,
    })));

    let bus = crate::MemoryBus::new();
    let dispatcher = crate::Dispatcher::new(Arc::new(bus.clone()), store, super::harness::settings());
    let calls = CallCounter::default();
    let action = echo_action("projects.list", ResponseProtocol::Direct, calls.clone());

    let mut replies = crate::MessageBus::subscribe(&bus, "_INBOX.flaky").await.unwrap();
    let msg = crate::InboundMessage::new(super::harness::subject("S1", "projects.list"), b"".to_vec())
        .with_reply_to("_INBOX.flaky");

    let report = dispatcher.dispatch(&action, &msg).await;

    assert_eq!(report.error, Some(ErrorKind::CredentialsError));
    assert_eq!(report.stage, DispatchStage::BodyDecoded);
    assert_eq!(calls.count(), 0);

    let reply = next_json(&mut replies).await;
    assert_eq!(reply["error"], "credentials_error");
    assert!(reply["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to retrieve credentials: "));
}

#[tokio::test]
async fn credentials_written_by_another_process_are_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jira_credentials.json");
    let store = Arc::new(CredentialStore::open(&path).unwrap());

    let bus = crate::MemoryBus::new();
    let dispatcher = crate::Dispatcher::new(Arc::new(bus.clone()), store, super::harness::settings());
    let calls = CallCounter::default();
    let action = echo_action("projects.list", ResponseProtocol::Direct, calls.clone());
    let msg = crate::InboundMessage::new(super::harness::subject("S1", "projects.list"), b"".to_vec());

    let report = dispatcher.dispatch(&action, &msg).await;
    assert_eq!(report.error, Some(ErrorKind::CredentialsNotConfigured));

    // A separate writer onboards S1 while the dispatcher keeps running.
    CredentialStore::open(&path)
        .unwrap()
        .save("S1", super::harness::bundle())
        .unwrap();

    let report = dispatcher.dispatch(&action, &msg).await;
    assert!(report.executed());
    assert_eq!(calls.count(), 1);
}

/// Backend whose reads take a while, like a slow disk.
struct SlowBackend {
    delay: std::time::Duration,
    collection: CredentialCollection,
}

impl CredentialBackend for SlowBackend {
    fn load(&self) -> StorageResult<Option<CredentialCollection>> {
        std::thread::sleep(self.delay);
        Ok(Some(self.collection.clone()))
    }

    fn store(&self, _collection: &CredentialCollection) -> StorageResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "slow".to_string()
    }
}

#[tokio::test(flavor = "current_thread")]
async fn slow_credential_reads_do_not_stall_the_runtime() {
    let mut collection = CredentialCollection::new();
    collection.insert("S1".into(), super::harness::bundle());
    let store = Arc::new(CredentialStore::new(Box::new(SlowBackend {
        delay: std::time::Duration::from_millis(150),
        collection,
    })));

    let bus = crate::MemoryBus::new();
    let dispatcher = crate::Dispatcher::new(Arc::new(bus.clone()), store, super::harness::settings());
    let calls = CallCounter::default();
    let action = echo_action("projects.list", ResponseProtocol::Direct, calls.clone());
    let msg = crate::InboundMessage::new(super::harness::subject("S1", "projects.list"), b"".to_vec());

    let ticks = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let ticker = {
        let ticks = ticks.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                ticks.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        })
    };

    // Two loads (existence check, then fetch) at 150ms each.
    let report = dispatcher.dispatch(&action, &msg).await;
    ticker.abort();

    assert!(report.executed());
    assert_eq!(calls.count(), 1);
    let ticks = ticks.load(std::sync::atomic::Ordering::SeqCst);
    assert!(ticks >= 10, "ticker advanced only {ticks} times during dispatch");
}
