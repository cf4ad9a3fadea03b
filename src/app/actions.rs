use serde_json::Value;

use crate::api::{ApiClient, ErrorKind};
use crate::app::non_empty_or_else;
use crate::app::results::{ActionPayload, HostResponse, ItemAction, ResultItem};
use crate::config::Preferences;
use crate::events::{AuditEvent, EventSink};
use crate::launch::{note_deep_link, UrlOpener};
use crate::snippet::format_snippet;

const CREATED_FALLBACK: &str = "Saved using the Web Clipper API";

/// Performs the side effect behind a selected result.
pub struct ActionExecutor<'a> {
    client: &'a ApiClient<'a>,
    events: &'a dyn EventSink,
    opener: &'a dyn UrlOpener,
    deep_link_scheme: &'a str,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(
        client: &'a ApiClient<'a>,
        events: &'a dyn EventSink,
        opener: &'a dyn UrlOpener,
        deep_link_scheme: &'a str,
    ) -> Self {
        Self {
            client,
            events,
            opener,
            deep_link_scheme,
        }
    }

    /// Entry point for raw payloads handed back by the host.
    pub fn execute_value(&self, data: &Value, prefs: &Preferences) -> HostResponse {
        let event_type = data.get("type").and_then(Value::as_str);
        self.events.record(
            AuditEvent::new("item_enter").with("event_type", event_type.map(str::to_owned)),
        );
        match ActionPayload::from_value(data) {
            Ok(payload) => self.execute(&payload, prefs),
            Err(reason) => {
                self.events.record(
                    AuditEvent::new("item_enter_ignored")
                        .with("reason", reason)
                        .with("event_type", event_type.map(str::to_owned)),
                );
                HostResponse::Noop
            }
        }
    }

    pub fn execute(&self, payload: &ActionPayload, prefs: &Preferences) -> HostResponse {
        match payload {
            ActionPayload::OpenNote { note_id } => self.open_note(note_id, prefs),
            ActionPayload::CreateNote { title, body } => self.create_note(title, body, prefs),
        }
    }

    fn open_note(&self, note_id: &str, prefs: &Preferences) -> HostResponse {
        if note_id.is_empty() {
            self.events.record(
                AuditEvent::new("open_note_missing_id").with("kind", ErrorKind::MissingInput.as_str()),
            );
            return HostResponse::Noop;
        }
        if prefs.token().is_none() {
            self.events.record(
                AuditEvent::new("open_note_missing_token")
                    .with("kind", ErrorKind::MissingCredential.as_str()),
            );
            return self.open_deep_link(note_id);
        }

        self.events
            .record(AuditEvent::new("open_note_request").with("note_id", note_id));
        match self.client.open_note(prefs, note_id) {
            Ok(_) => {
                self.events
                    .record(AuditEvent::new("open_note_success").with("note_id", note_id));
                HostResponse::HideWindow
            }
            Err(err) => {
                tracing::warn!(note_id, error = %err, "openNote command failed, using deep link");
                self.events.record(
                    AuditEvent::new("open_note_error")
                        .with("error", err.detail())
                        .with("kind", err.kind().as_str()),
                );
                self.open_deep_link(note_id)
            }
        }
    }

    fn open_deep_link(&self, note_id: &str) -> HostResponse {
        let url = note_deep_link(self.deep_link_scheme, note_id);
        self.events
            .record(AuditEvent::new("fallback_open_url").with("url", url.as_str()));
        match self.opener.open(&url) {
            Ok(()) => HostResponse::HideWindow,
            Err(err) => {
                tracing::warn!(%url, error = %err, "could not launch url handler");
                self.events
                    .record(AuditEvent::new("fallback_open_failed").with("error", err.to_string()));
                HostResponse::OpenUrl { url }
            }
        }
    }

    fn create_note(&self, title: &str, body: &str, prefs: &Preferences) -> HostResponse {
        if prefs.token().is_none() {
            self.events.record(
                AuditEvent::new("create_note_missing_token")
                    .with("kind", ErrorKind::MissingCredential.as_str()),
            );
            return HostResponse::render(vec![ResultItem::missing_token()]);
        }

        let created = match self.client.create_note(prefs, title, body) {
            Ok(created) => created,
            Err(err) => {
                tracing::warn!(kind = err.kind().as_str(), error = %err, "note creation failed");
                self.events.record(
                    AuditEvent::new("create_note_error")
                        .with("error", err.detail())
                        .with("kind", err.kind().as_str()),
                );
                return HostResponse::render(vec![ResultItem::api_error(&err)]);
            }
        };

        let note_id = created
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty());
        self.events.record(
            AuditEvent::new("create_note_success").with("note_id", note_id.map(str::to_owned)),
        );
        let description = non_empty_or_else(format_snippet(body), || CREATED_FALLBACK.to_owned());
        let mut item = ResultItem::new(format!("Created '{title}'"), description);
        if let Some(note_id) = note_id {
            item = item.with_action(ItemAction::OpenUrl {
                url: note_deep_link(self.deep_link_scheme, note_id),
            });
        }
        HostResponse::render(vec![item])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::StubTransport;
    use crate::api::transport::TransportError;
    use crate::config::DEFAULT_DEEP_LINK_SCHEME;
    use crate::events::MemorySink;
    use crate::launch::testing::RecordingOpener;
    use serde_json::json;

    fn prefs() -> Preferences {
        Preferences::new("http://127.0.0.1:41184", "SECRET")
    }

    fn run(
        stub: &StubTransport,
        opener: &RecordingOpener,
        sink: &MemorySink,
        payload: &ActionPayload,
        prefs: &Preferences,
    ) -> HostResponse {
        let client = ApiClient::new(stub, sink);
        ActionExecutor::new(&client, sink, opener, DEFAULT_DEEP_LINK_SCHEME).execute(payload, prefs)
    }

    fn open(note_id: &str) -> ActionPayload {
        ActionPayload::OpenNote {
            note_id: note_id.into(),
        }
    }

    #[test]
    fn open_note_success_hides_window() {
        let stub = StubTransport::replying("{}");
        let opener = RecordingOpener::default();
        let sink = MemorySink::default();
        let response = run(&stub, &opener, &sink, &open("n1"), &prefs());
        assert_eq!(response, HostResponse::HideWindow);
        assert!(opener.opened().is_empty());
        assert!(sink.find("open_note_success").is_some());
    }

    #[test]
    fn open_note_connection_failure_falls_back_to_deep_link() {
        let stub = StubTransport::failing(TransportError::Connection("timed out".into()));
        let opener = RecordingOpener::default();
        let sink = MemorySink::default();
        let response = run(&stub, &opener, &sink, &open("n1"), &prefs());
        assert_eq!(response, HostResponse::HideWindow);
        assert_eq!(opener.opened(), vec!["joplin://x-callback-url/openNote?id=n1"]);
        assert!(response.items().is_empty());
        assert!(sink.find("open_note_error").is_some());
    }

    #[test]
    fn open_note_invalid_response_also_falls_back() {
        let stub = StubTransport::replying("<html>");
        let opener = RecordingOpener::default();
        let sink = MemorySink::default();
        run(&stub, &opener, &sink, &open("n1"), &prefs());
        assert_eq!(opener.opened().len(), 1);
    }

    #[test]
    fn open_note_without_token_skips_the_api() {
        let stub = StubTransport::default();
        let opener = RecordingOpener::default();
        let sink = MemorySink::default();
        let response = run(&stub, &opener, &sink, &open("n1"), &Preferences::new("", ""));
        assert_eq!(response, HostResponse::HideWindow);
        assert!(stub.requests().is_empty());
        assert_eq!(opener.opened().len(), 1);
    }

    #[test]
    fn failed_launch_returns_open_url_action() {
        let stub = StubTransport::failing(TransportError::Connection("refused".into()));
        let opener = RecordingOpener::failing();
        let sink = MemorySink::default();
        let response = run(&stub, &opener, &sink, &open("n1"), &prefs());
        assert_eq!(
            response,
            HostResponse::OpenUrl {
                url: "joplin://x-callback-url/openNote?id=n1".into()
            }
        );
        assert!(sink.find("fallback_open_failed").is_some());
    }

    #[test]
    fn open_note_with_empty_id_is_noop() {
        let stub = StubTransport::default();
        let opener = RecordingOpener::default();
        let sink = MemorySink::default();
        let response = run(&stub, &opener, &sink, &open(""), &prefs());
        assert_eq!(response, HostResponse::Noop);
        assert!(opener.opened().is_empty());
    }

    #[test]
    fn create_note_success_links_to_new_note() {
        let stub = StubTransport::replying(r#"{"id":"n2","title":"Trip"}"#);
        let opener = RecordingOpener::default();
        let sink = MemorySink::default();
        let payload = ActionPayload::CreateNote {
            title: "Trip".into(),
            body: "Pack bags".into(),
        };
        let response = run(&stub, &opener, &sink, &payload, &prefs());
        let items = response.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Created 'Trip'");
        assert_eq!(items[0].description, "Pack bags");
        assert_eq!(
            items[0].action,
            Some(ItemAction::OpenUrl {
                url: "joplin://x-callback-url/openNote?id=n2".into()
            })
        );
    }

    #[test]
    fn create_note_without_returned_id_has_no_action() {
        let stub = StubTransport::replying(r#"{"title":"Trip"}"#);
        let opener = RecordingOpener::default();
        let sink = MemorySink::default();
        let payload = ActionPayload::CreateNote {
            title: "Trip".into(),
            body: String::new(),
        };
        let response = run(&stub, &opener, &sink, &payload, &prefs());
        assert_eq!(
            response.items(),
            &[ResultItem::new("Created 'Trip'", CREATED_FALLBACK)]
        );
    }

    #[test]
    fn create_note_failures_render_error_items() {
        let opener = RecordingOpener::default();
        let sink = MemorySink::default();
        let payload = ActionPayload::CreateNote {
            title: "Trip".into(),
            body: String::new(),
        };

        let stub = StubTransport::failing(TransportError::Connection("refused".into()));
        let response = run(&stub, &opener, &sink, &payload, &prefs());
        assert_eq!(response.items()[0].name, "Cannot reach Joplin");
        assert_eq!(response.items()[0].description, "refused");

        let stub = StubTransport::replying("[]");
        let response = run(&stub, &opener, &sink, &payload, &prefs());
        assert_eq!(response.items()[0].name, "Invalid response from Joplin");
        assert!(opener.opened().is_empty());
    }

    #[test]
    fn create_note_without_token_prompts_for_it() {
        let stub = StubTransport::default();
        let opener = RecordingOpener::default();
        let sink = MemorySink::default();
        let payload = ActionPayload::CreateNote {
            title: "Trip".into(),
            body: String::new(),
        };
        let response = run(&stub, &opener, &sink, &payload, &Preferences::new("", ""));
        assert_eq!(response, HostResponse::render(vec![ResultItem::missing_token()]));
        assert!(stub.requests().is_empty());
    }

    #[test]
    fn unknown_payloads_are_ignored() {
        let stub = StubTransport::default();
        let opener = RecordingOpener::default();
        let sink = MemorySink::default();
        let client = ApiClient::new(&stub, &sink);
        let executor = ActionExecutor::new(&client, &sink, &opener, DEFAULT_DEEP_LINK_SCHEME);

        for data in [json!(null), json!({"type": "archive-note", "note_id": "n1"})] {
            assert_eq!(executor.execute_value(&data, &prefs()), HostResponse::Noop);
        }
        assert!(stub.requests().is_empty());
        let ignored = sink.find("item_enter_ignored").expect("ignored event");
        assert_eq!(ignored.field("reason").and_then(|v| v.as_str()), Some("not_dict"));
    }

    #[test]
    fn raw_payload_reaches_the_api() {
        let stub = StubTransport::replying("{}");
        let opener = RecordingOpener::default();
        let sink = MemorySink::default();
        let client = ApiClient::new(&stub, &sink);
        let executor = ActionExecutor::new(&client, &sink, &opener, DEFAULT_DEEP_LINK_SCHEME);

        let response =
            executor.execute_value(&json!({"type": "open-note", "note_id": "n1"}), &prefs());
        assert_eq!(response, HostResponse::HideWindow);
        assert_eq!(stub.requests().len(), 1);
    }
}
