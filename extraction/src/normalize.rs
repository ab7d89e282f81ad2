//! Whitespace cleanup of captured text, and detection of explicit "no value" placeholders.

use lazy_regex::{regex_is_match, regex_replace_all};

/// Placeholder tokens that a registry extract uses to state that a field explicitly has no value.
/// Compared case-insensitively after trimming.
pub const EMPTY_MARKERS: &[&str] = &[
    "-",
    "—",
    "–",
    "нет",
    "отсутствует",
    "не определено",
    "не установлено",
    "данные отсутствуют",
    "сведения отсутствуют",
];

/// Trims leading and trailing whitespace and collapses every internal run of whitespace
/// (including newlines) to a single space.
pub fn clean(text: &str) -> String {
    let mut s = text.to_string();
    clean_in_place(&mut s);
    s
}

/// As [clean], but in-place.
pub fn clean_in_place(s: &mut String) {
    let trimmed = s.trim();
    // Skip the copy/realloc if nothing to do.
    if trimmed.len() != s.len() || regex_is_match!(r"\s{2,}|[^\S ]", trimmed) {
        let new = regex_replace_all!(r"\s+", trimmed, " ");
        *s = new.to_string();
    }
}

/// Removes all whitespace from `text`, leaving every other character as-is.
pub fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Returns true if `text` is one of [EMPTY_MARKERS].
pub fn is_empty_marker(text: &str) -> bool {
    let candidate = text.trim().to_lowercase();
    EMPTY_MARKERS.iter().any(|marker| marker.to_lowercase() == candidate)
}
