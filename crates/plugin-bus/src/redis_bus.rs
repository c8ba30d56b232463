//! Redis pub/sub message bus.
//!
//! Every message is a JSON frame `{"frame": 1, "reply_to": ..., "payload": <base64>}`
//! published on the subject as channel. Subscription patterns become Redis
//! glob patterns (`*` for each wildcard segment) and are re-checked locally
//! with segment semantics. Retained publishes additionally
//! `SET retained:<subject>` with a TTL; subscribing to an exact subject
//! replays that value first.

use crate::bus::{InboundMessage, MessageBus, MessageStream};
use crate::topic::{is_wildcard, subject_matches};
use crate::{BusError, BusResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Key prefix for retained values.
pub const RETAINED_KEY_PREFIX: &str = "retained:";

/// Version tag carried by every frame this bus writes.
const FRAME_VERSION: u8 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct WireFrame {
    frame: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reply_to: Option<String>,
    payload: String,
}

fn encode_frame(reply_to: Option<&str>, payload: &[u8]) -> BusResult<Vec<u8>> {
    let frame = WireFrame {
        frame: FRAME_VERSION,
        reply_to: reply_to.map(String::from),
        payload: STANDARD.encode(payload),
    };
    Ok(serde_json::to_vec(&frame)?)
}

/// Anything that is not one of our frames is a bare payload from another
/// publisher and carries no reply address.
fn decode_frame(subject: &str, data: &[u8]) -> InboundMessage {
    let frame = serde_json::from_slice::<WireFrame>(data)
        .ok()
        .filter(|frame| frame.frame == FRAME_VERSION)
        .and_then(|frame| {
            let payload = STANDARD.decode(&frame.payload).ok()?;
            Some((frame.reply_to, payload))
        });
    match frame {
        Some((reply_to, payload)) => InboundMessage {
            subject: subject.to_string(),
            reply_to,
            payload,
        },
        None => InboundMessage::new(subject, data),
    }
}

/// The retained value replayed on subscribe, which the live stream may
/// deliver again when it was published between PSUBSCRIBE and GET.
#[derive(Debug, Default)]
struct ReplayedFrame(Option<Vec<u8>>);

impl ReplayedFrame {
    /// True once, for the first live frame identical to the replayed one.
    fn is_repeat(&mut self, data: &[u8]) -> bool {
        if self.0.as_deref() == Some(data) {
            self.0 = None;
            return true;
        }
        false
    }
}

/// Translate a segment pattern into a Redis glob pattern.
fn glob_pattern(pattern: &str) -> String {
    pattern
        .split('.')
        .map(|segment| match segment {
            "*" | ">" => "*".to_string(),
            literal => escape_glob(literal),
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn escape_glob(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn retained_key(subject: &str) -> String {
    format!("{RETAINED_KEY_PREFIX}{subject}")
}

/// Message bus over Redis pub/sub.
pub struct RedisBus {
    client: Client,
    conn: MultiplexedConnection,
}

impl RedisBus {
    /// Connect to Redis at `redis_url`.
    pub async fn connect(redis_url: &str) -> BusResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!(url = %redis_url, "Connected to Redis");
        Ok(Self { client, conn })
    }

    async fn publish_frame(&self, subject: &str, frame: &[u8]) -> BusResult<()> {
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(subject, frame).await?;
        debug!(subject = %subject, receivers, "Published message");
        Ok(())
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn subscribe(&self, pattern: &str) -> BusResult<MessageStream> {
        if pattern.is_empty() {
            return Err(BusError::InvalidSubject("empty pattern".to_string()));
        }

        let mut pubsub = self.client.get_async_pubsub().await?;
        let glob = glob_pattern(pattern);
        pubsub.psubscribe(&glob).await?;
        info!(pattern = %pattern, glob = %glob, "Subscribed");

        let mut replay = Vec::new();
        let mut replayed = ReplayedFrame::default();
        if !is_wildcard(pattern) {
            let mut conn = self.conn.clone();
            let retained: Option<Vec<u8>> = conn.get(retained_key(pattern)).await?;
            if let Some(data) = retained {
                replay.push(decode_frame(pattern, &data));
                replayed = ReplayedFrame(Some(data));
            }
        }

        let owned_pattern = pattern.to_string();
        let live = pubsub.into_on_message().filter_map(move |msg| {
            let subject = msg.get_channel_name().to_string();
            let data = msg.get_payload_bytes();
            let message = if !subject_matches(&owned_pattern, &subject) {
                None
            } else if replayed.is_repeat(data) {
                debug!(subject = %subject, "Skipping live copy of replayed message");
                None
            } else {
                Some(decode_frame(&subject, data))
            };
            futures_util::future::ready(message)
        });

        Ok(Box::pin(futures_util::stream::iter(replay).chain(live)))
    }

    async fn publish(&self, subject: &str, payload: &[u8]) -> BusResult<()> {
        let frame = encode_frame(None, payload)?;
        self.publish_frame(subject, &frame).await
    }

    async fn publish_with_reply(
        &self,
        subject: &str,
        reply_to: &str,
        payload: &[u8],
    ) -> BusResult<()> {
        let frame = encode_frame(Some(reply_to), payload)?;
        self.publish_frame(subject, &frame).await
    }

    async fn publish_retained(&self, subject: &str, payload: &[u8], ttl: Duration) -> BusResult<()> {
        let frame = encode_frame(None, payload)?;

        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.conn.clone();
        if let Err(e) = conn
            .set_ex::<_, _, ()>(retained_key(subject), frame.as_slice(), ttl_secs)
            .await
        {
            warn!(subject = %subject, error = %e, "Failed to retain message");
        }

        self.publish_frame(subject, &frame).await
    }
}
