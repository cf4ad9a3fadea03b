//! Launcher-facing request/response protocol.
//!
//! The host owns the event loop. It sends a [`HostRequest`] per keystroke or
//! selection and renders whatever [`HostResponse`] comes back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::transport::HttpTransport;
use crate::api::ApiClient;
use crate::app::{ActionExecutor, HostResponse, QueryDispatcher};
use crate::config::{HostPreferences, Preferences};
use crate::events::EventSink;
use crate::launch::UrlOpener;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostRequest {
    Query {
        #[serde(default)]
        text: String,
        #[serde(default)]
        preferences: HostPreferences,
    },
    Select {
        #[serde(default)]
        payload: Value,
        #[serde(default)]
        preferences: HostPreferences,
    },
}

/// Owns the collaborators for one host session and answers its requests.
pub struct Bridge<'a> {
    transport: &'a dyn HttpTransport,
    events: &'a dyn EventSink,
    opener: &'a dyn UrlOpener,
    preferences: Preferences,
    deep_link_scheme: String,
}

impl<'a> Bridge<'a> {
    pub fn new(
        transport: &'a dyn HttpTransport,
        events: &'a dyn EventSink,
        opener: &'a dyn UrlOpener,
        preferences: Preferences,
        deep_link_scheme: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            events,
            opener,
            preferences,
            deep_link_scheme: deep_link_scheme.into(),
        }
    }

    pub fn handle_query(&self, raw: &str, prefs: &Preferences) -> HostResponse {
        let client = ApiClient::new(self.transport, self.events);
        let items = QueryDispatcher::new(&client, self.events).dispatch(raw, prefs);
        HostResponse::render(items)
    }

    pub fn handle_selection(&self, payload: &Value, prefs: &Preferences) -> HostResponse {
        let client = ApiClient::new(self.transport, self.events);
        ActionExecutor::new(&client, self.events, self.opener, &self.deep_link_scheme)
            .execute_value(payload, prefs)
    }

    pub fn handle_request(&self, request: &HostRequest) -> HostResponse {
        match request {
            HostRequest::Query { text, preferences } => {
                self.handle_query(text, &self.preferences.overlay(preferences))
            }
            HostRequest::Select {
                payload,
                preferences,
            } => self.handle_selection(payload, &self.preferences.overlay(preferences)),
        }
    }

    /// Answers one JSON-encoded request. Never fails: malformed input yields
    /// an `error` response.
    pub fn handle_json(&self, line: &str) -> String {
        let response = match serde_json::from_str::<HostRequest>(line) {
            Ok(request) => self.handle_request(&request),
            Err(err) => {
                tracing::warn!(error = %err, "rejecting malformed host request");
                HostResponse::Error {
                    message: format!("invalid request: {err}"),
                }
            }
        };
        encode_response(&response)
    }
}

pub fn encode_response(response: &HostResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|err| {
        tracing::error!(error = %err, "failed to encode host response");
        r#"{"action":"error","message":"failed to encode response"}"#.to_owned()
    })
}
