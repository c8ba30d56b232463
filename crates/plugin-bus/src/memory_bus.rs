//! In-process message bus.

use crate::bus::{InboundMessage, MessageBus, MessageStream};
use crate::topic::subject_matches;
use crate::{BusError, BusResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::trace;

struct Subscriber {
    pattern: String,
    tx: mpsc::UnboundedSender<InboundMessage>,
}

struct Retained {
    payload: Vec<u8>,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    subscribers: Vec<Subscriber>,
    retained: HashMap<String, Retained>,
}

/// Fan-out bus living in process memory. Clones share the same bus.
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|s| !s.tx.is_closed());
        inner.subscribers.len()
    }

    /// Retained value for `subject`, if present and not expired.
    pub fn retained(&self, subject: &str) -> Option<Vec<u8>> {
        let inner = self.inner.lock();
        inner
            .retained
            .get(subject)
            .filter(|r| r.expires_at > Instant::now())
            .map(|r| r.payload.clone())
    }

    fn deliver(&self, message: InboundMessage) {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|subscriber| {
            if !subject_matches(&subscriber.pattern, &message.subject) {
                return !subscriber.tx.is_closed();
            }
            subscriber.tx.send(message.clone()).is_ok()
        });
        trace!(subject = %message.subject, "Delivered message");
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn subscribe(&self, pattern: &str) -> BusResult<MessageStream> {
        if pattern.is_empty() {
            return Err(BusError::InvalidSubject("empty pattern".to_string()));
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        {
            let mut inner = self.inner.lock();
            let now = Instant::now();
            inner.retained.retain(|_, r| r.expires_at > now);
            for (subject, retained) in &inner.retained {
                if subject_matches(pattern, subject) {
                    let _ = tx.send(InboundMessage::new(subject.clone(), retained.payload.clone()));
                }
            }
            inner.subscribers.push(Subscriber {
                pattern: pattern.to_string(),
                tx,
            });
        }

        Ok(Box::pin(futures_util::stream::poll_fn(move |cx| {
            rx.poll_recv(cx)
        })))
    }

    async fn publish(&self, subject: &str, payload: &[u8]) -> BusResult<()> {
        self.deliver(InboundMessage::new(subject, payload));
        Ok(())
    }

    async fn publish_with_reply(
        &self,
        subject: &str,
        reply_to: &str,
        payload: &[u8],
    ) -> BusResult<()> {
        self.deliver(InboundMessage::new(subject, payload).with_reply_to(reply_to));
        Ok(())
    }

    async fn publish_retained(&self, subject: &str, payload: &[u8], ttl: Duration) -> BusResult<()> {
        self.inner.lock().retained.insert(
            subject.to_string(),
            Retained {
                payload: payload.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        self.deliver(InboundMessage::new(subject, payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_wildcard_fan_out() {
        let bus = MemoryBus::new();
        let mut all = bus.subscribe("soren.v2.bin.*.jira.>").await.unwrap();
        let mut exact = bus.subscribe("soren.v2.bin.S1.jira.intro").await.unwrap();

        bus.publish("soren.v2.bin.S1.jira.intro", b"{}").await.unwrap();
        bus.publish("soren.v2.bin.S2.jira.issues.create", b"x").await.unwrap();

        assert_eq!(all.next().await.unwrap().subject, "soren.v2.bin.S1.jira.intro");
        assert_eq!(
            all.next().await.unwrap().subject,
            "soren.v2.bin.S2.jira.issues.create"
        );
        assert_eq!(exact.next().await.unwrap().payload, b"{}");
    }

    #[tokio::test]
    async fn test_reply_address_travels_with_message() {
        let bus = MemoryBus::new();
        let mut sub = bus.subscribe("a.>").await.unwrap();

        bus.publish_with_reply("a.b", "_INBOX.1", b"ping").await.unwrap();

        let msg = sub.next().await.unwrap();
        assert_eq!(msg.reply_to.as_deref(), Some("_INBOX.1"));
    }

    #[tokio::test]
    async fn test_retained_replayed_to_late_subscriber() {
        let bus = MemoryBus::new();
        bus.publish_retained("jobs.1", b"done", Duration::from_secs(60))
            .await
            .unwrap();

        let mut late = bus.subscribe("jobs.1").await.unwrap();
        assert_eq!(late.next().await.unwrap().payload, b"done");
        assert_eq!(bus.retained("jobs.1").as_deref(), Some(&b"done"[..]));
    }

    #[tokio::test]
    async fn test_expired_retained_not_replayed() {
        let bus = MemoryBus::new();
        bus.publish_retained("jobs.1", b"done", Duration::ZERO)
            .await
            .unwrap();
        assert!(bus.retained("jobs.1").is_none());

        let mut late = bus.subscribe("jobs.1").await.unwrap();
        bus.publish("jobs.1", b"fresh").await.unwrap();
        assert_eq!(late.next().await.unwrap().payload, b"fresh");
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let bus = MemoryBus::new();
        let sub = bus.subscribe("a.b").await.unwrap();
        assert_eq!(bus.subscriber_count(), 1);

        drop(sub);
        bus.publish("a.b", b"x").await.unwrap();
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_pattern_rejected() {
        let bus = MemoryBus::new();
        assert!(matches!(
            bus.subscribe("").await,
            Err(BusError::InvalidSubject(_))
        ));
    }
}
