//! Client for the Joplin Web Clipper API.
//!
//! Every call is a single synchronous attempt bounded by
//! [`transport::REQUEST_TIMEOUT`]. Failures come back as [`ApiError`] so the
//! caller decides how each kind is surfaced to the user.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use strum::IntoStaticStr;
use thiserror::Error;
use url::Url;

use crate::config::Preferences;
use crate::events::{AuditEvent, EventSink};

pub mod transport;

use self::transport::{HttpRequest, HttpTransport, Method, TransportError};

pub const SEARCH_LIMIT: usize = 10;
const REDACTED: &str = "***";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("cannot reach Joplin: {0}")]
    Connection(String),
    #[error("invalid response from Joplin: {0}")]
    InvalidResponse(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Connection,
    InvalidResponse,
    Unexpected,
    MissingCredential,
    MissingInput,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Connection(_) => ErrorKind::Connection,
            ApiError::InvalidResponse(_) => ErrorKind::InvalidResponse,
            ApiError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            ApiError::Connection(detail)
            | ApiError::InvalidResponse(detail)
            | ApiError::Unexpected(detail) => detail,
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Connection(detail) => ApiError::Connection(detail),
            TransportError::Other(detail) => ApiError::Unexpected(detail),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NoteSummary {
    pub id: Option<String>,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub body: Option<String>,
    pub parent_id: Option<String>,
}

impl NoteSummary {
    /// Excerpt when the server supplied a non-empty one, otherwise the body.
    pub fn excerpt_or_body(&self) -> &str {
        match self.excerpt.as_deref() {
            Some(excerpt) if !excerpt.is_empty() => excerpt,
            _ => self.body.as_deref().unwrap_or_default(),
        }
    }
}

pub struct ApiClient<'a> {
    transport: &'a dyn HttpTransport,
    events: &'a dyn EventSink,
}

impl<'a> ApiClient<'a> {
    pub fn new(transport: &'a dyn HttpTransport, events: &'a dyn EventSink) -> Self {
        Self { transport, events }
    }

    pub fn search(&self, prefs: &Preferences, query: &str) -> ApiResult<Vec<NoteSummary>> {
        let limit = SEARCH_LIMIT.to_string();
        let url = endpoint(
            prefs.host(),
            "search",
            &[
                ("query", query),
                ("token", prefs.token().unwrap_or_default()),
                ("limit", limit.as_str()),
                ("type", "note"),
            ],
        )?;
        self.events.record(
            AuditEvent::new("search_notes")
                .with("query_length", query.chars().count())
                .with("host", prefs.host()),
        );
        let response = self.fetch_json(Method::Get, url, None)?;
        parse_search_items(response)
    }

    pub fn create_note(
        &self,
        prefs: &Preferences,
        title: &str,
        body: &str,
    ) -> ApiResult<Map<String, Value>> {
        let url = endpoint(
            prefs.host(),
            "notes",
            &[("token", prefs.token().unwrap_or_default())],
        )?;
        let mut payload = Map::new();
        payload.insert("title".into(), Value::from(title));
        if !body.is_empty() {
            payload.insert("body".into(), Value::from(body));
        }
        self.events.record(
            AuditEvent::new("create_note_request")
                .with("host", prefs.host())
                .with("title", title)
                .with("body_length", body.chars().count()),
        );
        match self.fetch_json(Method::Post, url, Some(Value::Object(payload)))? {
            Value::Object(created) => Ok(created),
            other => Err(ApiError::InvalidResponse(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn execute_command(
        &self,
        prefs: &Preferences,
        command_type: &str,
        extra_fields: Map<String, Value>,
    ) -> ApiResult<Value> {
        let url = endpoint(
            prefs.host(),
            "commands",
            &[("token", prefs.token().unwrap_or_default())],
        )?;
        let mut redacted = extra_fields.clone();
        if redacted.contains_key("token") {
            redacted.insert("token".into(), Value::from(REDACTED));
        }
        self.events.record(
            AuditEvent::new("command_request")
                .with("command", command_type)
                .with("details", Value::Object(redacted)),
        );
        let mut payload = Map::new();
        payload.insert("type".into(), Value::from(command_type));
        payload.extend(extra_fields);
        self.fetch_json(Method::Post, url, Some(Value::Object(payload)))
    }

    pub fn open_note(&self, prefs: &Preferences, note_id: &str) -> ApiResult<Value> {
        let mut fields = Map::new();
        fields.insert("noteId".into(), Value::from(note_id));
        self.execute_command(prefs, "openNote", fields)
    }

    fn fetch_json(&self, method: Method, url: Url, payload: Option<Value>) -> ApiResult<Value> {
        let body = payload
            .map(|value| serde_json::to_string(&value))
            .transpose()
            .map_err(|err| ApiError::Unexpected(format!("encoding request body: {err}")))?;
        let url = String::from(url);
        self.events.record(
            AuditEvent::new("fetch")
                .with("method", method.to_string())
                .with("url", redact_url(&url)),
        );
        tracing::debug!(%method, url = %redact_url(&url), "sending request");
        let raw = self.transport.send(&HttpRequest { method, url, body })?;
        serde_json::from_str(&raw).map_err(|err| ApiError::InvalidResponse(err.to_string()))
    }
}

/// Masks the value of the `token` query parameter, keeping the rest of the URL intact.
pub fn redact_url(url: &str) -> String {
    static TOKEN_PARAM: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"([?&]token=)[^&#]*").expect("valid token pattern"));
    TOKEN_PARAM
        .replace_all(url, format!("${{1}}{REDACTED}"))
        .into_owned()
}

fn endpoint(host: &str, path: &str, params: &[(&str, &str)]) -> ApiResult<Url> {
    let mut url = Url::parse(&format!("{host}/{path}"))
        .map_err(|err| ApiError::Unexpected(format!("invalid Joplin host '{host}': {err}")))?;
    url.query_pairs_mut().extend_pairs(params.iter());
    Ok(url)
}

fn parse_search_items(response: Value) -> ApiResult<Vec<NoteSummary>> {
    let Value::Object(mut object) = response else {
        return Err(ApiError::InvalidResponse(format!(
            "expected a JSON object, got {}",
            json_type_name(&response)
        )));
    };
    match object.remove("items") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(items @ Value::Array(_)) => serde_json::from_value(items)
            .map_err(|err| ApiError::InvalidResponse(format!("malformed search items: {err}"))),
        Some(other) => Err(ApiError::InvalidResponse(format!(
            "expected 'items' to be an array, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
