//! Credential store reads and writes stay off the async workers.

use super::harness::{next_json, Plugin};
use credential_storage::{
    CredentialBackend, CredentialCollection, CredentialStore, MemoryBackend, StorageResult,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Memory backend that sleeps on every call.
struct SlowBackend {
    inner: MemoryBackend,
    delay: Duration,
}

impl CredentialBackend for SlowBackend {
    fn load(&self) -> StorageResult<Option<CredentialCollection>> {
        std::thread::sleep(self.delay);
        self.inner.load()
    }

    fn store(&self, collection: &CredentialCollection) -> StorageResult<()> {
        std::thread::sleep(self.delay);
        self.inner.store(collection)
    }

    fn describe(&self) -> String {
        "slow".to_string()
    }
}

/// Count 10ms ticks on the current runtime until aborted.
fn ticker() -> (Arc<AtomicUsize>, tokio::task::JoinHandle<()>) {
    let ticks = Arc::new(AtomicUsize::new(0));
    let counted = ticks.clone();
    let handle = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
            counted.fetch_add(1, Ordering::SeqCst);
        }
    });
    (ticks, handle)
}

#[tokio::test(flavor = "current_thread")]
async fn onboarding_and_intro_do_not_stall_the_runtime() {
    let store = Arc::new(CredentialStore::new(Box::new(SlowBackend {
        inner: MemoryBackend::new(),
        delay: Duration::from_millis(100),
    })));
    let plugin = Plugin::start_with_store(store).await;
    let (inbox, mut replies) = plugin.inbox("slow").await;

    let (ticks, handle) = ticker();
    plugin
        .send(
            "S1",
            "onboarding",
            br#"{"instanceUrl":"https://x.atlassian.net","email":"a@b.com","apiToken":"tok"}"#,
            &inbox,
        )
        .await;
    assert_eq!(
        next_json(&mut replies).await,
        json!({ "status": "accepted", "message": "Credentials saved successfully" })
    );

    plugin.send("S1", "intro", b"", &inbox).await;
    assert_eq!(next_json(&mut replies).await["meta"]["credentialsConfigured"], true);
    handle.abort();

    // One load and one store for onboarding, one load for intro.
    let ticks = ticks.load(Ordering::SeqCst);
    assert!(ticks >= 10, "ticker advanced only {ticks} times");

    plugin.stop().await;
}
