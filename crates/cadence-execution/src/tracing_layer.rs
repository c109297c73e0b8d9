//! Custom tracing layer for feeding command progress into the live-status
//! registry.
//!
//! Execution environments report progress with ordinary tracing events that
//! carry a `progress` field. The layer picks those up, resolves the
//! interaction they belong to from the event's own fields or its enclosing
//! spans, and forwards them over a channel; [`forward_progress`] drains the
//! channel into a [`LiveStatusRegistry`].
//!
//! ```ignore
//! let (tx, rx) = mpsc::unbounded_channel();
//! tracing_subscriber::registry().with(LiveStatusLayer::new(tx)).init();
//! tokio::spawn(forward_progress(rx, registry.clone()));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

use cadence_application::LiveStatusRegistry;

/// Field marking an event as a progress report.
pub const PROGRESS_FIELD: &str = "progress";
pub const SESSION_ID_FIELD: &str = "session_id";
pub const INTERACTION_ID_FIELD: &str = "interaction_id";

/// Progress report extracted from a tracing event.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ProgressEvent {
    pub session_id: String,
    pub interaction_id: String,
    /// Value of the `progress` field
    pub message: String,
    /// Event target (e.g., "cadence_execution::shell")
    pub target: String,
}

/// Span fields recorded at span creation, stored in the span's extensions.
#[derive(Debug, Default, Clone)]
struct SpanFields(HashMap<String, Value>);

/// A tracing layer that sends progress events to a channel
pub struct LiveStatusLayer {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl LiveStatusLayer {
    pub fn new(sender: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { sender }
    }
}

impl<S> Layer<S> for LiveStatusLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = SpanFields::default();
        attrs.record(&mut FieldVisitor(&mut fields.0));
        span.extensions_mut().insert(fields);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            values.record(&mut FieldVisitor(&mut fields.0));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut fields = HashMap::new();
        event.record(&mut FieldVisitor(&mut fields));

        let Some(message) = fields.get(PROGRESS_FIELD).and_then(Value::as_str).map(str::to_string) else {
            return;
        };

        // Innermost span wins; the event's own fields win over any span
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(span_fields) = span.extensions().get::<SpanFields>() {
                    for key in [SESSION_ID_FIELD, INTERACTION_ID_FIELD] {
                        if !fields.contains_key(key) {
                            if let Some(value) = span_fields.0.get(key) {
                                fields.insert(key.to_string(), value.clone());
                            }
                        }
                    }
                }
            }
        }

        let field = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);
        let (Some(session_id), Some(interaction_id)) = (field(SESSION_ID_FIELD), field(INTERACTION_ID_FIELD)) else {
            return;
        };

        // Non-blocking send - if the receiver is dropped, we just skip
        let _ = self.sender.send(ProgressEvent {
            session_id,
            interaction_id,
            message,
            target: event.metadata().target().to_string(),
        });
    }
}

/// Drains progress events into `registry` until every sender is gone.
pub async fn forward_progress(mut receiver: mpsc::UnboundedReceiver<ProgressEvent>, registry: Arc<LiveStatusRegistry>) {
    while let Some(event) = receiver.recv().await {
        registry
            .report(event.session_id, event.interaction_id, event.message)
            .await;
    }
}

/// Field visitor that extracts tracing fields into a HashMap
struct FieldVisitor<'a>(&'a mut HashMap<String, Value>);

impl tracing::field::Visit for FieldVisitor<'_> {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        // `?value` strings arrive quoted
        let text = format!("{:?}", value);
        let text = text
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .map(str::to_string)
            .unwrap_or(text);
        self.0.insert(field.name().to_string(), serde_json::json!(text));
    }
}
