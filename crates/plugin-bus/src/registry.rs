//! Action descriptors and the registry that holds them.

use crate::outcome::ActionOutcome;
use crate::{BusError, BusResult};
use credential_storage::CredentialBundle;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// How an action delivers its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseProtocol {
    /// One reply carrying the outcome.
    Direct,
    /// Immediate `{jobId, progress: 0}` ack, outcome published later on the job channel.
    Handshake,
}

/// Caller-side form for an action. Never used for validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionForm {
    pub jsonui: Value,
    pub jsonschema: Value,
}

impl ActionForm {
    pub fn new(jsonui: Value, jsonschema: Value) -> Self {
        Self { jsonui, jsonschema }
    }

    /// Form for actions that take no input.
    pub fn empty() -> Self {
        Self {
            jsonui: json!({ "type": "VerticalLayout", "elements": [] }),
            jsonschema: json!({ "type": "object", "properties": {} }),
        }
    }
}

/// Everything a handler receives for one invocation.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// Tenant identifier as extracted from the subject (may be empty).
    pub tenant: String,
    pub credentials: CredentialBundle,
    /// Decoded request body.
    pub body: Map<String, Value>,
}

/// Handler function type for actions.
pub type HandlerFn =
    Arc<dyn Fn(ActionContext) -> Pin<Box<dyn Future<Output = ActionOutcome> + Send>> + Send + Sync>;

/// A registered action.
#[derive(Clone)]
pub struct ActionDescriptor {
    pub method: String,
    pub title: String,
    pub description: String,
    pub form: ActionForm,
    pub protocol: ResponseProtocol,
    handler: HandlerFn,
}

impl ActionDescriptor {
    pub fn new<F, Fut>(
        method: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        protocol: ResponseProtocol,
        form: ActionForm,
        handler: F,
    ) -> Self
    where
        F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionOutcome> + Send + 'static,
    {
        let handler: HandlerFn = Arc::new(move |ctx| Box::pin(handler(ctx)));
        Self {
            method: method.into(),
            title: title.into(),
            description: description.into(),
            form,
            protocol,
            handler,
        }
    }

    /// Run the business function.
    pub async fn invoke(&self, ctx: ActionContext) -> ActionOutcome {
        (self.handler)(ctx).await
    }

    /// Description advertised in the plugin intro.
    pub fn summary(&self) -> Value {
        json!({
            "method": self.method,
            "title": self.title,
            "description": self.description,
            "protocol": self.protocol,
            "jsonui": self.form.jsonui,
            "jsonschema": self.form.jsonschema,
        })
    }
}

impl std::fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("method", &self.method)
            .field("protocol", &self.protocol)
            .finish_non_exhaustive()
    }
}

/// Ordered set of actions, fixed once the server starts.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: Vec<Arc<ActionDescriptor>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from descriptors in order.
    pub fn from_actions(actions: impl IntoIterator<Item = ActionDescriptor>) -> BusResult<Self> {
        let mut registry = Self::new();
        for action in actions {
            registry.register(action)?;
        }
        Ok(registry)
    }

    /// Append an action. Method names must be unique.
    pub fn register(&mut self, action: ActionDescriptor) -> BusResult<()> {
        if self.get(&action.method).is_some() {
            return Err(BusError::DuplicateAction(action.method));
        }
        self.actions.push(Arc::new(action));
        Ok(())
    }

    pub fn get(&self, method: &str) -> Option<Arc<ActionDescriptor>> {
        self.actions.iter().find(|a| a.method == method).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ActionDescriptor>> {
        self.actions.iter()
    }

    pub fn methods(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.method.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
