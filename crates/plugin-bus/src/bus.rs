//! Message bus abstraction.

use crate::BusResult;
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;
use std::time::Duration;

/// A message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub subject: String,
    /// Where a reply should be published, if the sender expects one.
    pub reply_to: Option<String>,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(subject: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            subject: subject.into(),
            reply_to: None,
            payload: payload.into(),
        }
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }
}

/// Stream of messages for one subscription.
pub type MessageStream = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// Topic-routed publish/subscribe transport.
///
/// Patterns are dot-separated; `*` matches one segment and a trailing `>`
/// matches one or more segments.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Subscribe to every subject matching `pattern`.
    async fn subscribe(&self, pattern: &str) -> BusResult<MessageStream>;

    /// Publish a message that expects no reply.
    async fn publish(&self, subject: &str, payload: &[u8]) -> BusResult<()>;

    /// Publish a request whose replies go to `reply_to`.
    async fn publish_with_reply(&self, subject: &str, reply_to: &str, payload: &[u8])
        -> BusResult<()>;

    /// Publish and keep the value for `ttl` so later subscribers to the
    /// subject still receive it.
    async fn publish_retained(&self, subject: &str, payload: &[u8], ttl: Duration)
        -> BusResult<()>;
}
