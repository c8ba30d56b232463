//! Request dispatch pipeline.
//!
//! Each inbound action request moves through
//! `Received -> BodyDecoded -> Authorized -> Executing`.
//! Any failure before `Executing` short-circuits to a reply carrying the
//! error; nothing is retried.

use crate::bus::{InboundMessage, MessageBus};
use crate::jobs::{JobRegistry, PendingJob};
use crate::outcome::{ActionOutcome, ErrorKind};
use crate::registry::{ActionContext, ActionDescriptor, ResponseProtocol};
use crate::topic::extract_tenant;
use credential_storage::{tenant_key, CredentialBundle, CredentialStore};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tracing::{debug, error, info, warn};

/// Default prefix of handshake completion channels.
pub const DEFAULT_JOB_CHANNEL_PREFIX: &str = "soren.v2.jobs";

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DispatchStage {
    Received,
    BodyDecoded,
    Authorized,
    Executing,
}

/// What happened to one message, for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Tenant identifier as extracted from the subject.
    pub tenant: String,
    /// Furthest stage reached before responding.
    pub stage: DispatchStage,
    pub protocol: ResponseProtocol,
    /// Set once a handshake ack has been prepared.
    pub job_id: Option<String>,
    /// Failure kind of the final outcome, if any.
    pub error: Option<ErrorKind>,
}

impl DispatchReport {
    fn new(tenant: &str, protocol: ResponseProtocol) -> Self {
        Self {
            tenant: tenant.to_string(),
            stage: DispatchStage::Received,
            protocol,
            job_id: None,
            error: None,
        }
    }

    pub fn executed(&self) -> bool {
        self.stage >= DispatchStage::Executing
    }
}

/// Pipeline tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Completions go to `<job_channel_prefix>.<jobId>`.
    pub job_channel_prefix: String,
    /// Pause between a handshake ack and execution. Zero disables.
    pub handshake_delay: Duration,
    /// How long completion events stay retained.
    pub retained_ttl: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            job_channel_prefix: DEFAULT_JOB_CHANNEL_PREFIX.to_string(),
            handshake_delay: Duration::from_millis(1000),
            retained_ttl: Duration::from_secs(300),
        }
    }
}

impl DispatchSettings {
    pub fn job_channel(&self, job_id: &str) -> String {
        format!("{}.{}", self.job_channel_prefix, job_id)
    }
}

#[derive(Debug, Deserialize)]
struct RequestEnvelope {
    #[serde(default)]
    body: Option<Map<String, Value>>,
}

/// Decode `{"body": {...}}`. Empty payloads and a missing or null body give an empty map.
pub fn decode_body(payload: &[u8]) -> Result<Map<String, Value>, serde_json::Error> {
    if payload.is_empty() {
        return Ok(Map::new());
    }
    let envelope: RequestEnvelope = serde_json::from_slice(payload)?;
    Ok(envelope.body.unwrap_or_default())
}

/// Message for a tenant that has not completed onboarding.
pub fn credentials_not_configured_message(tenant: &str) -> String {
    if tenant.is_empty() {
        "Jira credentials not configured. Please complete the onboarding process first."
            .to_string()
    } else {
        format!(
            "Jira credentials not configured for space '{tenant}'. Please complete the onboarding process first."
        )
    }
}

/// Publish `payload` on the message's reply address. Returns false when there is none.
pub async fn respond(bus: &dyn MessageBus, msg: &InboundMessage, payload: &[u8]) -> bool {
    let Some(reply_to) = msg.reply_to.as_deref() else {
        warn!(subject = %msg.subject, "No reply address, dropping reply");
        return false;
    };
    match bus.publish(reply_to, payload).await {
        Ok(()) => true,
        Err(e) => {
            error!(subject = %msg.subject, reply_to = %reply_to, error = %e, "Failed to publish reply");
            false
        }
    }
}

/// Serialize a JSON value and reply with it.
pub async fn respond_json(bus: &dyn MessageBus, msg: &InboundMessage, value: &Value) -> bool {
    match serde_json::to_vec(value) {
        Ok(bytes) => respond(bus, msg, &bytes).await,
        Err(e) => {
            error!(subject = %msg.subject, error = %e, "Failed to serialize reply");
            false
        }
    }
}

/// Runs registered actions for inbound messages.
pub struct Dispatcher {
    bus: Arc<dyn MessageBus>,
    store: Arc<CredentialStore>,
    jobs: Arc<JobRegistry>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(bus: Arc<dyn MessageBus>, store: Arc<CredentialStore>, settings: DispatchSettings) -> Self {
        Self {
            bus,
            store,
            jobs: Arc::new(JobRegistry::new()),
            settings,
        }
    }

    pub fn jobs(&self) -> &Arc<JobRegistry> {
        &self.jobs
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Run `action` for `msg` and deliver its result.
    pub async fn dispatch(&self, action: &ActionDescriptor, msg: &InboundMessage) -> DispatchReport {
        let tenant = extract_tenant(&msg.subject);
        let mut report = DispatchReport::new(tenant, action.protocol);
        info!(
            action = %action.method,
            tenant = %tenant,
            subject = %msg.subject,
            payload_len = msg.payload.len(),
            "Action request received"
        );

        let body = match decode_body(&msg.payload) {
            Ok(body) => body,
            Err(e) => {
                warn!(action = %action.method, error = %e, "Failed to decode action request");
                let outcome = ActionOutcome::failure(ErrorKind::InvalidRequest, "Failed to parse request");
                self.reject(msg, &outcome, &mut report).await;
                return report;
            }
        };
        report.stage = DispatchStage::BodyDecoded;

        let credentials = match self.load_credentials(tenant).await {
            Ok(Some(credentials)) => credentials,
            Ok(None) => {
                let message = credentials_not_configured_message(tenant);
                info!(action = %action.method, tenant = %tenant, "Action rejected: credentials not configured");
                let outcome = ActionOutcome::failure(ErrorKind::CredentialsNotConfigured, message)
                    .with_context("action", action.method.as_str())
                    .with_context("spaceId", tenant);
                self.reject(msg, &outcome, &mut report).await;
                return report;
            }
            Err(e) => {
                error!(tenant = %tenant_key(tenant), error = %e, "Failed to load credentials");
                let outcome = ActionOutcome::failure(
                    ErrorKind::CredentialsError,
                    format!("Failed to retrieve credentials: {e}"),
                );
                self.reject(msg, &outcome, &mut report).await;
                return report;
            }
        };
        report.stage = DispatchStage::Authorized;

        let ctx = ActionContext {
            tenant: tenant.to_string(),
            credentials,
            body,
        };

        match action.protocol {
            ResponseProtocol::Direct => self.run_direct(action, msg, ctx, &mut report).await,
            ResponseProtocol::Handshake => self.run_handshake(action, msg, ctx, &mut report).await,
        }

        debug!(
            action = %action.method,
            tenant = %tenant,
            error = ?report.error,
            "Dispatch finished"
        );
        report
    }

    /// Existence check and load, off the async workers. `Ok(None)` means the
    /// tenant has not onboarded.
    async fn load_credentials(&self, tenant: &str) -> Result<Option<CredentialBundle>, String> {
        let store = Arc::clone(&self.store);
        let tenant = tenant.to_string();
        let lookup = task::spawn_blocking(move || {
            if !store.exists(&tenant) {
                return Ok(None);
            }
            store.get(&tenant).map(Some)
        })
        .await;

        match lookup {
            Ok(Ok(credentials)) => Ok(credentials),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("credential lookup task failed: {e}")),
        }
    }

    async fn reject(&self, msg: &InboundMessage, outcome: &ActionOutcome, report: &mut DispatchReport) {
        report.error = outcome.error_kind();
        respond_json(self.bus.as_ref(), msg, &outcome.to_wire()).await;
    }

    async fn run_direct(
        &self,
        action: &ActionDescriptor,
        msg: &InboundMessage,
        ctx: ActionContext,
        report: &mut DispatchReport,
    ) {
        report.stage = DispatchStage::Executing;
        let outcome = action.invoke(ctx).await;
        report.error = outcome.error_kind();

        match outcome.to_bytes() {
            Ok(bytes) => {
                respond(self.bus.as_ref(), msg, &bytes).await;
            }
            Err(e) => {
                error!(action = %action.method, error = %e, "Failed to serialize outcome");
                let fallback = ActionOutcome::failure(ErrorKind::InternalError, "Failed to serialize response");
                report.error = fallback.error_kind();
                respond_json(self.bus.as_ref(), msg, &fallback.to_wire()).await;
            }
        }
    }

    async fn run_handshake(
        &self,
        action: &ActionDescriptor,
        msg: &InboundMessage,
        ctx: ActionContext,
        report: &mut DispatchReport,
    ) {
        let job = self.jobs.begin(&ctx.tenant);
        let job_id = job.id().to_string();
        report.job_id = Some(job_id.clone());

        let ack = match serde_json::to_vec(&json!({ "jobId": job_id, "progress": 0 })) {
            Ok(ack) => ack,
            Err(e) => {
                error!(action = %action.method, error = %e, "Failed to serialize handshake ack");
                drop(job);
                let outcome = ActionOutcome::failure(ErrorKind::InternalError, "Failed to serialize response");
                self.reject(msg, &outcome, report).await;
                return;
            }
        };

        if msg.reply_to.is_some() {
            respond(self.bus.as_ref(), msg, &ack).await;
        } else {
            debug!(job_id = %job_id, "No reply address, skipping handshake ack");
        }
        info!(action = %action.method, tenant = %ctx.tenant, job_id = %job_id, "Handshake acknowledged");

        if !self.settings.handshake_delay.is_zero() {
            tokio::time::sleep(self.settings.handshake_delay).await;
        }

        report.stage = DispatchStage::Executing;
        let tenant = ctx.tenant.clone();
        let outcome = action.invoke(ctx).await;
        report.error = outcome.error_kind();

        self.complete_job(job, &tenant, &outcome).await;
    }

    async fn complete_job(&self, job: PendingJob, tenant: &str, outcome: &ActionOutcome) {
        let job_id = job.id().to_string();
        let entity_id = job.complete().unwrap_or_else(|| tenant.to_string());

        let status = if outcome.is_success() { "completed" } else { "failed" };
        let event = json!({
            "jobId": job_id,
            "entityId": entity_id,
            "progress": 100,
            "status": status,
            "result": outcome.to_wire(),
        });

        let channel = self.settings.job_channel(&job_id);
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Failed to serialize job completion");
                return;
            }
        };

        match self
            .bus
            .publish_retained(&channel, &payload, self.settings.retained_ttl)
            .await
        {
            Ok(()) => info!(job_id = %job_id, status, channel = %channel, "Job completed"),
            Err(e) => error!(job_id = %job_id, channel = %channel, error = %e, "Failed to publish job completion"),
        }
    }
}
