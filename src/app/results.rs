use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::api::ApiError;
use crate::query::default_title;

pub const ICON_PATH: &str = "images/icon.png";

/// Deferred action attached to a result and handed back by the host on selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ActionPayload {
    OpenNote {
        note_id: String,
    },
    CreateNote {
        #[serde(default, deserialize_with = "null_as_empty")]
        title: String,
        #[serde(default, deserialize_with = "null_as_empty")]
        body: String,
    },
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ActionPayload {
    /// Validates a payload coming back from the host. Unknown or malformed
    /// payloads yield `Err` with a short reason for the audit log.
    pub fn from_value(value: &Value) -> Result<Self, &'static str> {
        let Some(object) = value.as_object() else {
            return Err("not_dict");
        };
        match object.get("type").and_then(Value::as_str) {
            Some("open-note") | Some("create-note") => {}
            _ => return Err("unsupported_type"),
        }
        let payload: ActionPayload =
            serde_json::from_value(value.clone()).map_err(|_| "malformed_payload")?;
        Ok(payload.normalized())
    }

    fn normalized(self) -> Self {
        match self {
            ActionPayload::CreateNote { title, body } => ActionPayload::CreateNote {
                title: default_title(&title),
                body,
            },
            open => open,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ActionPayload::OpenNote { .. } => "open-note",
            ActionPayload::CreateNote { .. } => "create-note",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemAction {
    Custom {
        payload: ActionPayload,
        keep_app_open: bool,
    },
    OpenUrl {
        url: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultItem {
    pub icon: String,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ItemAction>,
}

impl ResultItem {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            icon: ICON_PATH.to_owned(),
            name: name.into(),
            description: description.into(),
            action: None,
        }
    }

    pub fn with_action(mut self, action: ItemAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn payload(&self) -> Option<&ActionPayload> {
        match &self.action {
            Some(ItemAction::Custom { payload, .. }) => Some(payload),
            _ => None,
        }
    }

    pub fn missing_token() -> Self {
        Self::new(
            "Joplin token is missing",
            "Open extension preferences and paste your Web Clipper token",
        )
    }

    pub fn empty_query() -> Self {
        Self::new(
            "Start typing to search or add",
            "Use the keyword, then text to search, or '+Title::Body' to add a note",
        )
    }

    pub fn missing_title() -> Self {
        Self::new("Provide a note title", "Use +Title::Body to add a note")
    }

    pub fn api_error(err: &ApiError) -> Self {
        let name = match err {
            ApiError::Connection(_) => "Cannot reach Joplin",
            ApiError::InvalidResponse(_) => "Invalid response from Joplin",
            ApiError::Unexpected(_) => "Unexpected error",
        };
        Self::new(name, err.detail())
    }
}

/// What the host should do after a query or selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HostResponse {
    RenderResults { items: Vec<ResultItem> },
    HideWindow,
    OpenUrl { url: String },
    Noop,
    Error { message: String },
}

impl HostResponse {
    pub fn render(items: Vec<ResultItem>) -> Self {
        HostResponse::RenderResults { items }
    }

    pub fn items(&self) -> &[ResultItem] {
        match self {
            HostResponse::RenderResults { items } => items,
            _ => &[],
        }
    }
}
