use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::sync::Mutex;

use serde_json::{json, Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

pub const AUDIT_TARGET: &str = "joplin_bridge::audit";

/// One structured audit record: an event name plus already-redacted fields.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub name: &'static str,
    pub fields: Map<String, Value>,
}

impl AuditEvent {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

pub trait EventSink {
    fn record(&self, event: AuditEvent);
}

/// Forwards audit events to `tracing` under [`AUDIT_TARGET`].
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    enabled: bool,
}

impl TracingSink {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl EventSink for TracingSink {
    fn record(&self, event: AuditEvent) {
        if !self.enabled {
            return;
        }
        let payload = Value::Object(event.fields).to_string();
        tracing::info!(target: AUDIT_TARGET, event = event.name, payload = payload.as_str());
    }
}

/// Writes [`AUDIT_TARGET`] events as one JSON object per line, keeping the
/// payload nested: `{"timestamp":..,"event":..,"payload":{..}}`.
pub struct AuditLayer<W> {
    writer: Mutex<W>,
}

impl<W: Write> AuditLayer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for AuditLayer<W>
where
    S: Subscriber,
    W: Write + Send + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() != AUDIT_TARGET {
            return;
        }
        let mut fields = AuditFields::default();
        event.record(&mut fields);
        let Some(name) = fields.event else {
            return;
        };
        let line = audit_line(OffsetDateTime::now_utc(), &name, fields.payload);
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        let _ = writeln!(writer, "{line}").and_then(|_| writer.flush());
    }
}

#[derive(Default)]
struct AuditFields {
    event: Option<String>,
    payload: Value,
}

impl Visit for AuditFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "event" => self.event = Some(value.to_owned()),
            "payload" => {
                self.payload =
                    serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
            }
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_str(field, &format!("{value:?}"));
    }
}

fn audit_line(at: OffsetDateTime, event: &str, payload: Value) -> String {
    let payload = if payload.is_null() {
        Value::Object(Map::new())
    } else {
        payload
    };
    let timestamp = at.format(&Rfc3339).unwrap_or_default();
    json!({ "timestamp": timestamp, "event": event, "payload": payload }).to_string()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: AuditEvent) {}
}

/// Keeps every event in memory; used by tests to assert on the audit trail.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: RefCell<Vec<AuditEvent>>,
}

impl MemorySink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.borrow().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(|e| e.name).collect()
    }

    pub fn find(&self, name: &str) -> Option<AuditEvent> {
        self.events.borrow().iter().find(|e| e.name == name).cloned()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: AuditEvent) {
        self.events.borrow_mut().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use time::macros::datetime;
    use tracing_subscriber::prelude::*;

    #[test]
    fn builder_collects_fields() {
        let event = AuditEvent::new("search_notes")
            .with("query_length", 5)
            .with("host", "http://127.0.0.1:41184");
        assert_eq!(event.field("query_length"), Some(&Value::from(5)));
        assert_eq!(
            event.field("host").and_then(Value::as_str),
            Some("http://127.0.0.1:41184")
        );
    }

    #[test]
    fn memory_sink_records_events() {
        let sink = MemorySink::default();
        sink.record(AuditEvent::new("keyword_event").with("length", 3));
        sink.record(AuditEvent::new("keyword_empty"));
        assert_eq!(sink.names(), vec!["keyword_event", "keyword_empty"]);
        assert!(sink.find("keyword_empty").is_some());
        assert!(sink.find("missing").is_none());
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("buffer lock").write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn audit_line_nests_payload() {
        let line = audit_line(
            datetime!(2024-05-01 12:30:00 UTC),
            "search_error",
            json!({"kind": "connection"}),
        );
        let record: Value = serde_json::from_str(&line).expect("audit line is json");
        assert_eq!(
            record,
            json!({
                "timestamp": "2024-05-01T12:30:00Z",
                "event": "search_error",
                "payload": {"kind": "connection"}
            })
        );
        let bare = audit_line(datetime!(2024-05-01 12:30:00 UTC), "keyword_empty", Value::Null);
        assert!(bare.contains(r#""payload":{}"#));
    }

    #[test]
    fn audit_layer_writes_structured_lines() -> anyhow::Result<()> {
        let buf = SharedBuf::default();
        let subscriber = tracing_subscriber::registry().with(AuditLayer::new(buf.clone()));
        tracing::subscriber::with_default(subscriber, || {
            TracingSink::new(true).record(
                AuditEvent::new("create_note_success").with("note_id", "n1"),
            );
            tracing::info!("not an audit event");
        });

        let written = String::from_utf8(buf.0.lock().expect("buffer lock").clone())?;
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 1);
        let record: Value = serde_json::from_str(lines[0])?;
        assert_eq!(record["event"], "create_note_success");
        assert_eq!(record["payload"], json!({"note_id": "n1"}));
        assert!(record["timestamp"].as_str().is_some_and(|t| t.ends_with('Z')));
        Ok(())
    }

    #[test]
    fn tracing_sink_accepts_events_without_subscriber() {
        TracingSink::new(false).record(AuditEvent::new("noop"));
        TracingSink::new(true).record(AuditEvent::new("noop").with("k", "v"));
    }
}
