//! Plugin bus: topic-routed action dispatch for multi-tenant plugins.
//!
//! Requests arrive on subjects like `soren.v2.bin.<tenant>.<plugin>.<method>`.
//! The tenant is taken from the subject, its credentials are loaded from the
//! credential store, and the registered action runs with them. Results go
//! back either directly on the reply address or through a job handshake.
//!
//! # Response protocols
//!
//! - **Direct**: one reply carrying the outcome.
//! - **Handshake**: an immediate `{jobId, progress: 0}` reply, then a retained
//!   completion event on `<job_channel_prefix>.<jobId>`.
//!
//! # Architecture
//!
//! ```text
//! MessageBus -> PluginServer -> Dispatcher -> ActionDescriptor handler
//!                    |              |
//!              intro/onboarding  CredentialStore
//! ```

pub mod bus;
pub mod dispatch;
pub mod error;
pub mod jobs;
pub mod memory_bus;
pub mod outcome;
pub mod redis_bus;
pub mod registry;
pub mod server;
pub mod topic;

#[cfg(test)]
mod tests;

pub use bus::{InboundMessage, MessageBus, MessageStream};
pub use dispatch::{DispatchReport, DispatchSettings, DispatchStage, Dispatcher};
pub use error::{BusError, BusResult};
pub use jobs::{JobRegistry, PendingJob};
pub use memory_bus::MemoryBus;
pub use outcome::{ActionOutcome, ErrorKind};
pub use redis_bus::RedisBus;
pub use registry::{
    ActionContext, ActionDescriptor, ActionForm, ActionRegistry, HandlerFn, ResponseProtocol,
};
pub use server::{ControlHandlerFn, ControlRequest, Handled, PluginServer};
