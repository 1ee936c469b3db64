//! Text processing utilities.

/// Length of the single-line previews used in diagnostics.
pub const PREVIEW_CHARS: usize = 120;

/// True when the text has no non-whitespace characters.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Single-line preview of `text`, at most `max_chars` characters.
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars()
        .take(max_chars)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Extract a document title: the first `# ` heading within the first 10 lines.
pub fn extract_title(content: &str) -> Option<String> {
    content
        .lines()
        .take(10)
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}
