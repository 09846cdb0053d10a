//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;

use regex::Regex;
use std::sync::OnceLock;

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// Truncate text to a maximum number of characters
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Find the first `http://` or `https://` URL in `text`
///
/// Returns the byte range of the URL. The URL ends at whitespace, a closing
/// parenthesis or the end of the text.
pub fn find_url(text: &str) -> Option<(usize, usize)> {
    let start = match (text.find("http://"), text.find("https://")) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };

    let end = text[start..]
        .find(|c: char| c.is_whitespace() || c == ')' || c == '）')
        .map(|offset| start + offset)
        .unwrap_or(text.len());

    Some((start, end))
}
