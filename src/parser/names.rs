//! Name extraction for teacher and assistant segments

use std::collections::HashSet;

use crate::utils::find_url;

/// Minimum number of characters a name must have by default
pub const DEFAULT_MIN_NAME_LEN: usize = 3;

/// Placeholders, connectors and URL fragments that show up where names are expected
pub const DEFAULT_NOISE_WORDS: &[&str] = &[
    "NAN", "NONE", "TBD", "待定", "未定", "無", "AND", "與", "和", "HTTPS", "HTTP", "WWW",
    "NOTION", "SO", "D", "A", "C", "ED", "DE", "PVS", "B", "E", "F", "CA", "EB", "BFCAC",
    "AFBB", "BBA", "FE", "CD", "FA", "CBA", "ABC", "DEF", "GHI", "JKL", "MNO", "PQR", "STU",
    "VWX", "YZ",
];

/// Rules deciding whether an extracted token is a plausible person name
#[derive(Debug, Clone)]
pub struct NameFilter {
    min_len: usize,
    noise: HashSet<String>,
}

impl Default for NameFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_NAME_LEN, DEFAULT_NOISE_WORDS.iter().copied())
    }
}

impl NameFilter {
    /// Create a filter with a minimum length and a noise word list
    ///
    /// Noise words are compared case-insensitively.
    pub fn new<I, S>(min_len: usize, noise_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            min_len,
            noise: noise_words
                .into_iter()
                .map(|w| w.as_ref().trim().to_uppercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    /// Add one more noise word
    pub fn with_noise_word(mut self, word: &str) -> Self {
        self.noise.insert(word.trim().to_uppercase());
        self
    }

    /// Minimum accepted name length in characters
    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// Check a candidate token
    pub fn accepts(&self, name: &str) -> bool {
        !name.is_empty()
            && name.chars().count() >= self.min_len
            && !name.chars().all(|c| c.is_numeric())
            && !self.noise.contains(&name.to_uppercase())
    }
}

/// Names and reference link extracted from one segment
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NameList {
    pub names: Vec<String>,
    pub link: Option<String>,
}

/// Extract the names listed in a teacher or assistant segment
///
/// The segment is split on ASCII and full-width commas. Each piece contributes
/// its leading run of letters, digits or CJK characters; a trailing
/// parenthesized link is not part of the name. The first URL in the segment is
/// kept as the segment's reference link.
pub fn extract_names(segment: &str, filter: &NameFilter) -> NameList {
    let link = find_url(segment).map(|(start, end)| segment[start..end].to_string());

    let mut names: Vec<String> = Vec::new();
    for piece in segment.split(|c: char| c == ',' || c == '，') {
        let name: String = piece
            .trim_start()
            .chars()
            .take_while(|c| c.is_alphanumeric())
            .collect();

        if !filter.accepts(&name) {
            if !name.is_empty() {
                tracing::trace!(token = %name, "Discarded name token");
            }
            continue;
        }

        if !names.contains(&name) {
            names.push(name);
        }
    }

    NameList { names, link }
}
