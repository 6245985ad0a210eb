//! Literal `<tag>…</tag>` extraction from a raw text blob.
//!
//! This is a substring search, not a markup parser: it finds the first
//! opening marker and the first closing marker independently, so a tag nested
//! inside itself is not understood.

pub const THINK: &str = "think";
pub const OUTPUT: &str = "output";

/// Trimmed text between the first `<tag>` and the first `</tag>`.
///
/// Returns an empty string when either marker is missing or the closing
/// marker does not come after the opening one. Callers treat empty as
/// "section absent".
pub fn extract_section<'a>(text: &'a str, tag: &str) -> &'a str {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");

    let (Some(open_at), Some(close_at)) = (text.find(&open), text.find(&close)) else {
        return "";
    };
    let start = open_at + open.len();
    if close_at <= open_at || close_at < start {
        return "";
    }
    text[start..close_at].trim()
}

/// Number of non-overlapping occurrences of `marker` in `text`.
pub fn count_marker(text: &str, marker: &str) -> usize {
    text.matches(marker).count()
}
