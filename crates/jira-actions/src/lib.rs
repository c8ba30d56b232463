//! Jira plugin: the actions, the onboarding handler and the intro responder.
//!
//! | method           | protocol  |
//! |------------------|-----------|
//! | `projects.list`  | direct    |
//! | `issues.create`  | handshake |
//! | `issues.delete`  | handshake |
//! | `issues.comment` | handshake |
//!
//! Handlers validate their body before any remote call. Remote failures are
//! reported as `jira_api_error` outcomes.

mod fields;
pub mod intro;
pub mod issues;
pub mod onboarding;
pub mod projects;

#[cfg(test)]
mod tests;

use credential_storage::CredentialStore;
use plugin_bus::{ActionDescriptor, ActionRegistry, BusResult, ControlRequest, PluginServer};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task;
use tracing::error;

pub use intro::{load_icon_base64, IntroMeta, IntroResponder, PluginIntro, Requirements};
pub use onboarding::handle_onboarding;

/// Every Jira action, in the order advertised by the intro.
pub fn all_actions() -> Vec<ActionDescriptor> {
    let mut actions = projects::actions();
    actions.extend(issues::actions());
    actions
}

pub fn build_registry() -> BusResult<ActionRegistry> {
    ActionRegistry::from_actions(all_actions())
}

/// Wire the intro responder and onboarding handler into `server`.
///
/// Both hooks touch the credential store, so they run on the blocking pool.
pub async fn install(server: &PluginServer, store: Arc<CredentialStore>, icon_base64: String) {
    let responder = Arc::new(IntroResponder::new(server.registry(), icon_base64));

    let intro_store = store.clone();
    server
        .set_intro_responder(move |req: ControlRequest| {
            let responder = responder.clone();
            let store = intro_store.clone();
            async move {
                task::spawn_blocking(move || responder.respond(&store, &req.tenant))
                    .await
                    .unwrap_or_else(|e| {
                        error!(error = %e, "Intro task failed");
                        Value::Null
                    })
            }
        })
        .await;

    server
        .set_onboarding_handler(move |req: ControlRequest| {
            let store = store.clone();
            async move {
                task::spawn_blocking(move || handle_onboarding(&store, &req.tenant, &req.payload))
                    .await
                    .unwrap_or_else(|e| {
                        error!(error = %e, "Onboarding task failed");
                        json!({ "status": "error", "error": format!("Failed to save credentials: {e}") })
                    })
            }
        })
        .await;
}
