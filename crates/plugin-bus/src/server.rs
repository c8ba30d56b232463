//! Plugin server.
//!
//! Subscribes to `<prefix>.bin.*.<plugin_id>.>` for every configured prefix
//! and handles each inbound message in its own task:
//!
//! - `intro` goes to the intro responder
//! - `onboarding` goes to the onboarding handler
//! - a registered method goes through the [`Dispatcher`]
//! - anything else is answered with `unknown_action`

use crate::bus::{InboundMessage, MessageBus};
use crate::dispatch::{respond_json, DispatchReport, Dispatcher};
use crate::outcome::{ActionOutcome, ErrorKind};
use crate::registry::ActionRegistry;
use crate::topic::{action_path, extract_tenant, inbound_pattern};
use crate::BusResult;
use futures_util::StreamExt;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Path answered by the intro responder.
pub const INTRO_PATH: &str = "intro";

/// Path answered by the onboarding handler.
pub const ONBOARDING_PATH: &str = "onboarding";

/// Input of the intro and onboarding hooks.
#[derive(Debug, Clone)]
pub struct ControlRequest {
    /// Tenant identifier as extracted from the subject (may be empty).
    pub tenant: String,
    pub payload: Vec<u8>,
}

/// Handler type for the intro and onboarding hooks. The returned value is the reply.
pub type ControlHandlerFn =
    Arc<dyn Fn(ControlRequest) -> Pin<Box<dyn Future<Output = Value> + Send>> + Send + Sync>;

/// How an inbound message was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    Intro,
    Onboarding,
    Action(DispatchReport),
    Unknown(String),
    Ignored,
}

#[derive(Default)]
struct Hooks {
    intro: Option<ControlHandlerFn>,
    onboarding: Option<ControlHandlerFn>,
}

/// Server that connects the bus to the registered actions.
pub struct PluginServer {
    bus: Arc<dyn MessageBus>,
    plugin_id: String,
    subject_prefixes: Vec<String>,
    registry: Arc<ActionRegistry>,
    dispatcher: Arc<Dispatcher>,
    hooks: Arc<RwLock<Hooks>>,
    shutdown_tx: watch::Sender<bool>,
}

impl PluginServer {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        plugin_id: impl Into<String>,
        subject_prefixes: Vec<String>,
        registry: Arc<ActionRegistry>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            bus,
            plugin_id: plugin_id.into(),
            subject_prefixes,
            registry,
            dispatcher,
            hooks: Arc::new(RwLock::new(Hooks::default())),
            shutdown_tx,
        }
    }

    /// Register the intro responder.
    pub async fn set_intro_responder<F, Fut>(&self, handler: F)
    where
        F: Fn(ControlRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        let boxed: ControlHandlerFn = Arc::new(move |req| Box::pin(handler(req)));
        self.hooks.write().await.intro = Some(boxed);
    }

    /// Register the onboarding handler.
    pub async fn set_onboarding_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(ControlRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        let boxed: ControlHandlerFn = Arc::new(move |req| Box::pin(handler(req)));
        self.hooks.write().await.onboarding = Some(boxed);
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// Subscription patterns the server listens on.
    pub fn patterns(&self) -> Vec<String> {
        self.subject_prefixes
            .iter()
            .map(|prefix| inbound_pattern(prefix, &self.plugin_id))
            .collect()
    }

    /// Trigger shutdown. Sticky: a `run` that starts afterwards returns at once.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Subscribe and serve until shutdown or until every subscription ends.
    ///
    /// In-flight messages are allowed to finish before this returns.
    pub async fn run(&self) -> BusResult<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if *shutdown_rx.borrow_and_update() {
            info!(plugin_id = %self.plugin_id, "Shutdown requested before start");
            return Ok(());
        }

        let mut streams = Vec::new();
        for pattern in self.patterns() {
            streams.push(self.bus.subscribe(&pattern).await?);
        }
        let mut inbound = futures_util::stream::select_all(streams);

        info!(
            plugin_id = %self.plugin_id,
            actions = ?self.registry.methods(),
            "Plugin server listening"
        );

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                next = inbound.next() => {
                    let Some(msg) = next else {
                        warn!("All subscriptions ended");
                        break;
                    };
                    let ctx = self.handler_context();
                    tasks.spawn(async move {
                        ctx.handle(msg).await;
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Message task failed");
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("Plugin server shutting down");
                    break;
                }
            }
        }

        let in_flight = tasks.len();
        if in_flight > 0 {
            info!(in_flight, "Waiting for in-flight messages");
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Message task failed");
            }
        }

        Ok(())
    }

    /// Handle one message inline. Used by `run` for every message.
    pub async fn handle(&self, msg: InboundMessage) -> Handled {
        self.handler_context().handle(msg).await
    }

    fn handler_context(&self) -> HandlerContext {
        HandlerContext {
            bus: self.bus.clone(),
            plugin_id: self.plugin_id.clone(),
            registry: self.registry.clone(),
            dispatcher: self.dispatcher.clone(),
            hooks: self.hooks.clone(),
        }
    }
}

/// Owned state a message task needs.
struct HandlerContext {
    bus: Arc<dyn MessageBus>,
    plugin_id: String,
    registry: Arc<ActionRegistry>,
    dispatcher: Arc<Dispatcher>,
    hooks: Arc<RwLock<Hooks>>,
}

impl HandlerContext {
    async fn handle(&self, msg: InboundMessage) -> Handled {
        let Some(path) = action_path(&msg.subject, &self.plugin_id) else {
            debug!(subject = %msg.subject, "Ignoring message outside plugin namespace");
            return Handled::Ignored;
        };

        match path {
            INTRO_PATH => {
                let hook = self.hooks.read().await.intro.clone();
                self.run_hook(hook, path, &msg).await
            }
            ONBOARDING_PATH => {
                let hook = self.hooks.read().await.onboarding.clone();
                self.run_hook(hook, path, &msg).await
            }
            method => match self.registry.get(method) {
                Some(action) => Handled::Action(self.dispatcher.dispatch(&action, &msg).await),
                None => self.unknown(method, &msg).await,
            },
        }
    }

    async fn run_hook(&self, hook: Option<ControlHandlerFn>, path: &str, msg: &InboundMessage) -> Handled {
        let Some(hook) = hook else {
            return self.unknown(path, msg).await;
        };

        let tenant = extract_tenant(&msg.subject).to_string();
        info!(path = %path, tenant = %tenant, "Control request received");
        let reply = hook(ControlRequest {
            tenant,
            payload: msg.payload.clone(),
        })
        .await;
        respond_json(self.bus.as_ref(), msg, &reply).await;

        if path == INTRO_PATH {
            Handled::Intro
        } else {
            Handled::Onboarding
        }
    }

    async fn unknown(&self, method: &str, msg: &InboundMessage) -> Handled {
        warn!(method = %method, subject = %msg.subject, "Unknown action");
        let outcome = ActionOutcome::failure(
            ErrorKind::UnknownAction,
            format!("Unknown action: {method}"),
        );
        respond_json(self.bus.as_ref(), msg, &outcome.to_wire()).await;
        Handled::Unknown(method.to_string())
    }
}
