//! JSONL event layer.
//!
//! One object per event. `tenant` and `action` fields are promoted to
//! top-level keys so per-tenant traffic can be filtered without parsing the
//! nested field map.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io::Write;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

const PROMOTED: [&str; 2] = ["tenant", "action"];

#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    pub ts: String,
    pub level: &'static str,
    pub service: String,
    pub pid: u32,
    pub target: String,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
}

#[derive(Default)]
struct Collector {
    msg: String,
    promoted: [Option<String>; 2],
    fields: Map<String, Value>,
}

impl Collector {
    fn put(&mut self, field: &Field, value: Value) {
        let name = field.name();
        if name == "message" {
            self.msg = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            return;
        }
        if let Some(slot) = PROMOTED.iter().position(|p| *p == name) {
            self.promoted[slot] = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
            return;
        }
        self.fields.insert(name.to_string(), value);
    }
}

impl Visit for Collector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_owned()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // NaN and infinities have no JSON number form.
        let value = serde_json::Number::from_f64(value)
            .map_or_else(|| Value::String(value.to_string()), Value::Number);
        self.put(field, value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::String(value.to_string()));
    }
}

/// Writes each event as a [`LogLine`] to `make_writer`.
pub struct JsonLayer<W> {
    service: String,
    pid: u32,
    make_writer: W,
}

impl<W> JsonLayer<W> {
    pub fn new(service: impl Into<String>, make_writer: W) -> Self {
        Self {
            service: service.into(),
            pid: std::process::id(),
            make_writer,
        }
    }

    fn line<S>(&self, event: &Event<'_>, ctx: &Context<'_, S>) -> LogLine
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let mut collector = Collector::default();
        event.record(&mut collector);
        let meta = event.metadata();
        let [tenant, action] = collector.promoted;

        LogLine {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level: meta.level().as_str(),
            service: self.service.clone(),
            pid: self.pid,
            target: meta.target().to_owned(),
            msg: collector.msg,
            tenant,
            action,
            fields: collector.fields,
            span: ctx.event_span(event).map(|span| span.name().to_owned()),
        }
    }
}

impl<S, W> Layer<S> for JsonLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Ok(mut encoded) = serde_json::to_vec(&self.line(event, &ctx)) else {
            return;
        };
        encoded.push(b'\n');
        let _ = self.make_writer.make_writer().write_all(&encoded);
    }
}
