pub const DIRECTIVE_PREFIX: char = '+';
pub const DIRECTIVE_DELIMITER: &str = "::";
pub const UNTITLED_NOTE: &str = "Untitled note";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Empty,
    /// Text after the leading `+`, trimmed. May be empty.
    CreateDirective(String),
    Search(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDirective {
    pub title: String,
    pub body: String,
}

pub fn classify(raw: &str) -> Classified {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Classified::Empty;
    }
    if let Some(rest) = trimmed.strip_prefix(DIRECTIVE_PREFIX) {
        return Classified::CreateDirective(rest.trim().to_owned());
    }
    Classified::Search(trimmed.to_owned())
}

/// Splits `Title::Body` on the first delimiter. Only the first `::` separates,
/// so bodies may contain the delimiter themselves.
pub fn parse_directive(text: &str) -> NoteDirective {
    let (title, body) = match text.split_once(DIRECTIVE_DELIMITER) {
        Some((title, body)) => (title.trim(), body.trim()),
        None => (text.trim(), ""),
    };
    NoteDirective {
        title: default_title(title),
        body: body.to_owned(),
    }
}

pub fn default_title(title: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        UNTITLED_NOTE.to_owned()
    } else {
        title.to_owned()
    }
}
