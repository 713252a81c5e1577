//! Tracing capture for asserting on revalid spans and events.
//!
//! Spans named `revalid.*` and events emitted from `revalid_*` crates are
//! recorded into a shared buffer. Run the code under test with the
//! collector's [`Dispatch`], for example through
//! [`WithSubscriber::with_subscriber`](tracing::instrument::WithSubscriber).

use std::sync::{Arc, Mutex};

use tracing::span::{Attributes, Id, Record};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

const SPAN_PREFIX: &str = "revalid.";
const TARGET_PREFIX: &str = "revalid_";

/// Captured span information.
#[derive(Debug, Clone)]
pub struct CapturedSpan {
    /// Unique span ID
    pub id: u64,
    /// Parent span ID (if any)
    pub parent_id: Option<u64>,
    /// The span name (e.g., "revalid.evaluate")
    pub name: String,
    /// Captured field values as strings
    pub fields: Vec<(String, String)>,
}

/// Captured event information.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    /// Event level
    pub level: Level,
    /// The event target (e.g., "revalid_http::evaluator")
    pub target: String,
    /// The formatted message
    pub message: String,
    /// Name of the enclosing span, if captured
    pub span: Option<String>,
    /// Remaining field values as strings
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    /// Returns the value of `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Default)]
struct Captured {
    spans: Vec<CapturedSpan>,
    events: Vec<CapturedEvent>,
}

/// A tracing layer that captures revalid spans and events.
pub struct CaptureLayer {
    captured: Arc<Mutex<Captured>>,
}

struct FieldVisitor {
    fields: Vec<(String, String)>,
}

impl FieldVisitor {
    fn new() -> Self {
        Self { fields: Vec::new() }
    }

    fn take_message(&mut self) -> String {
        match self.fields.iter().position(|(key, _)| key == "message") {
            Some(index) => self.fields.remove(index).1,
            None => String::new(),
        }
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.fields
            .push((field.name().to_string(), format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.fields
            .push((field.name().to_string(), value.to_string()));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields
            .push((field.name().to_string(), value.to_string()));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields
            .push((field.name().to_string(), value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields
            .push((field.name().to_string(), value.to_string()));
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let metadata = attrs.metadata();
        if !metadata.name().starts_with(SPAN_PREFIX) {
            return;
        }

        let mut visitor = FieldVisitor::new();
        attrs.record(&mut visitor);

        let parent_id = attrs
            .parent()
            .cloned()
            .or_else(|| {
                if attrs.is_contextual() {
                    ctx.current_span().id().cloned()
                } else {
                    None
                }
            })
            .map(|id| id.into_u64());

        let span = CapturedSpan {
            id: id.into_u64(),
            parent_id,
            name: metadata.name().to_string(),
            fields: visitor.fields,
        };

        self.captured.lock().unwrap().spans.push(span);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::new();
        values.record(&mut visitor);

        let span_id = id.into_u64();
        let mut captured = self.captured.lock().unwrap();
        if let Some(span) = captured.spans.iter_mut().find(|s| s.id == span_id) {
            for (key, value) in visitor.fields {
                if let Some(existing) = span.fields.iter_mut().find(|(k, _)| k == &key) {
                    existing.1 = value;
                } else {
                    span.fields.push((key, value));
                }
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with(TARGET_PREFIX) {
            return;
        }

        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);

        let span = ctx
            .event_span(event)
            .map(|span| span.name())
            .filter(|name| name.starts_with(SPAN_PREFIX))
            .map(String::from);

        let captured = CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: visitor.take_message(),
            span,
            fields: visitor.fields,
        };

        self.captured.lock().unwrap().events.push(captured);
    }
}

/// Collector for captured spans and events.
#[derive(Clone)]
pub struct TraceCollector {
    captured: Arc<Mutex<Captured>>,
    dispatch: Dispatch,
}

/// Create a new collector with its associated dispatch.
pub fn create_collector() -> TraceCollector {
    let captured = Arc::new(Mutex::new(Captured::default()));
    let layer = CaptureLayer {
        captured: captured.clone(),
    };
    let subscriber = Registry::default().with(layer);
    let dispatch = Dispatch::new(subscriber);
    TraceCollector { captured, dispatch }
}

impl TraceCollector {
    /// Get the dispatch to run the code under test with.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Get all captured spans.
    pub fn spans(&self) -> Vec<CapturedSpan> {
        self.captured.lock().unwrap().spans.clone()
    }

    /// Get captured span names in order.
    pub fn span_names(&self) -> Vec<String> {
        self.captured
            .lock()
            .unwrap()
            .spans
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Check if a span with the given name was captured.
    pub fn has_span(&self, name: &str) -> bool {
        self.captured
            .lock()
            .unwrap()
            .spans
            .iter()
            .any(|s| s.name == name)
    }

    /// Get a span by name (returns the last occurrence).
    pub fn get_span(&self, name: &str) -> Option<CapturedSpan> {
        self.captured
            .lock()
            .unwrap()
            .spans
            .iter()
            .rev()
            .find(|s| s.name == name)
            .cloned()
    }

    /// Get a field value from the last span with the given name.
    pub fn get_field(&self, span_name: &str, field_name: &str) -> Option<String> {
        self.get_span(span_name).and_then(|span| {
            span.fields
                .iter()
                .find(|(k, _)| k == field_name)
                .map(|(_, v)| v.clone())
        })
    }

    /// Get all captured events.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.captured.lock().unwrap().events.clone()
    }

    /// Events whose message contains `needle`.
    pub fn events_containing(&self, needle: &str) -> Vec<CapturedEvent> {
        self.captured
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.message.contains(needle))
            .cloned()
            .collect()
    }

    /// Events at exactly `level`.
    pub fn events_at(&self, level: Level) -> Vec<CapturedEvent> {
        self.captured
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }
}
