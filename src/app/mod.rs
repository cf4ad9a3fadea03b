//! Query dispatch: turns launcher input into result items.

use crate::api::{ApiClient, ErrorKind, NoteSummary};
use crate::config::Preferences;
use crate::events::{AuditEvent, EventSink};
use crate::query::{classify, parse_directive, Classified, UNTITLED_NOTE};
use crate::snippet::format_snippet;

pub mod actions;
pub mod results;

pub use self::actions::ActionExecutor;
pub use self::results::{ActionPayload, HostResponse, ItemAction, ResultItem};

const CREATE_PROMPT: &str = "Press Enter to create this note in Joplin";

pub struct QueryDispatcher<'a> {
    client: &'a ApiClient<'a>,
    events: &'a dyn EventSink,
}

impl<'a> QueryDispatcher<'a> {
    pub fn new(client: &'a ApiClient<'a>, events: &'a dyn EventSink) -> Self {
        Self { client, events }
    }

    pub fn dispatch(&self, raw: &str, prefs: &Preferences) -> Vec<ResultItem> {
        let classified = classify(raw);
        self.events
            .record(AuditEvent::new("keyword_event").with("length", raw.trim().chars().count()));
        match classified {
            Classified::Empty => {
                self.events.record(AuditEvent::new("keyword_empty"));
                vec![ResultItem::empty_query()]
            }
            Classified::CreateDirective(text) => self.create_preview(&text, prefs),
            Classified::Search(text) => self.search(&text, prefs),
        }
    }

    fn create_preview(&self, text: &str, prefs: &Preferences) -> Vec<ResultItem> {
        if text.is_empty() {
            self.record_precondition("add_note_missing_title", ErrorKind::MissingInput);
            return vec![ResultItem::missing_title()];
        }
        if prefs.token().is_none() {
            self.record_precondition("add_note_missing_token", ErrorKind::MissingCredential);
            return vec![ResultItem::missing_token()];
        }

        let directive = parse_directive(text);
        let description =
            non_empty_or_else(format_snippet(&directive.body), || CREATE_PROMPT.to_owned());
        let name = format!("Create note '{}'", directive.title);
        vec![ResultItem::new(name, description).with_action(ItemAction::Custom {
            payload: ActionPayload::CreateNote {
                title: directive.title,
                body: directive.body,
            },
            keep_app_open: true,
        })]
    }

    fn search(&self, query: &str, prefs: &Preferences) -> Vec<ResultItem> {
        if prefs.token().is_none() {
            self.record_precondition("search_missing_token", ErrorKind::MissingCredential);
            return vec![ResultItem::missing_token()];
        }

        let notes = match self.client.search(prefs, query) {
            Ok(notes) => notes,
            Err(err) => {
                tracing::warn!(kind = err.kind().as_str(), error = %err, "note search failed");
                self.events.record(
                    AuditEvent::new("search_error")
                        .with("error", err.detail())
                        .with("kind", err.kind().as_str()),
                );
                return vec![ResultItem::api_error(&err)];
            }
        };

        if notes.is_empty() {
            self.events.record(
                AuditEvent::new("search_no_results").with("query_length", query.chars().count()),
            );
            return vec![ResultItem::new(
                "No notes found",
                format!("Nothing matched '{query}'"),
            )];
        }

        notes.into_iter().map(note_item).collect()
    }

    fn record_precondition(&self, event: &'static str, kind: ErrorKind) {
        self.events
            .record(AuditEvent::new(event).with("kind", kind.as_str()));
    }
}

fn note_item(note: NoteSummary) -> ResultItem {
    let description = non_empty_or_else(format_snippet(note.excerpt_or_body()), || {
        let notebook = note
            .parent_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or("unknown");
        format!("Notebook ID: {notebook}")
    });
    let title = note
        .title
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| UNTITLED_NOTE.to_owned());
    let item = ResultItem::new(title, description);
    match note.id.filter(|id| !id.is_empty()) {
        Some(note_id) => item.with_action(ItemAction::Custom {
            payload: ActionPayload::OpenNote { note_id },
            keep_app_open: false,
        }),
        None => item,
    }
}

/// `text` unless it is empty, in which case the fallback is built.
pub(crate) fn non_empty_or_else(text: String, fallback: impl FnOnce() -> String) -> String {
    if text.is_empty() {
        fallback()
    } else {
        text
    }
}
