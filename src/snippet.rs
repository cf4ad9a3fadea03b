pub const SNIPPET_MAX_CHARS: usize = 120;
const ELLIPSIS: char = '…';

/// Collapses whitespace runs to single spaces and truncates to
/// [`SNIPPET_MAX_CHARS`], ending truncated text with an ellipsis.
pub fn format_snippet(text: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() <= SNIPPET_MAX_CHARS {
        return normalized;
    }
    let mut truncated: String = normalized.chars().take(SNIPPET_MAX_CHARS - 1).collect();
    truncated.truncate(truncated.trim_end().len());
    truncated.push(ELLIPSIS);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_newlines_and_runs_of_spaces() {
        assert_eq!(format_snippet("  hello \n\n  world\t!  "), "hello world !");
    }

    #[test]
    fn empty_and_blank_input_yield_empty() {
        assert_eq!(format_snippet(""), "");
        assert_eq!(format_snippet(" \n\t "), "");
    }

    #[test]
    fn truncates_long_text_to_cap() {
        let long = "word ".repeat(60);
        let snippet = format_snippet(&long);
        assert_eq!(snippet.chars().count(), SNIPPET_MAX_CHARS);
        assert!(snippet.ends_with(ELLIPSIS));
        assert!(!snippet.contains("  "));
    }

    #[test]
    fn strips_whitespace_before_ellipsis() {
        // char 119 lands on the space between words
        let text = format!("{} tail of the note", "a".repeat(118));
        let snippet = format_snippet(&text);
        assert_eq!(snippet, format!("{}…", "a".repeat(118)));
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "é".repeat(SNIPPET_MAX_CHARS);
        assert_eq!(format_snippet(&text), text);
        let longer = "é".repeat(SNIPPET_MAX_CHARS + 5);
        assert_eq!(format_snippet(&longer).chars().count(), SNIPPET_MAX_CHARS);
    }

    #[test]
    fn formatting_is_idempotent() {
        let samples = [
            String::new(),
            "short".to_string(),
            "  spaced\n out\ttext ".to_string(),
            "x ".repeat(200),
            format!("{} end", "b".repeat(130)),
            format!("{}  \n tail", "c".repeat(118)),
        ];
        for sample in samples {
            let once = format_snippet(&sample);
            assert!(once.chars().count() <= SNIPPET_MAX_CHARS);
            assert_eq!(format_snippet(&once), once, "sample: {sample:?}");
        }
    }
}
