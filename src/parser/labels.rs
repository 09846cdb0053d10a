//! Label anchors for course descriptions
//!
//! A description is a sequence of labeled segments in a fixed order:
//!
//! ```text
//! 時間: 20250101 0900-1000 班級:ABC 講師: TIM (http://x) 助教: BOB 教案: Algebra
//! └time──────────────────┘ └class─┘ └teacher──────────┘ └assist.┘ └lesson────┘
//! ```
//!
//! The scanner walks the labels in order with a single forward cursor. A label
//! counts as an anchor only when it is followed (after optional blanks) by an
//! ASCII or full-width colon, so a label word appearing inside free text does
//! not split a segment.

use crate::utils::error::ParseError;

/// A labeled segment of a course description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Time,
    Class,
    Teacher,
    Assistant,
    Lesson,
}

impl Label {
    /// Labels in the order they appear in a description
    pub const ORDER: [Label; 5] = [
        Label::Time,
        Label::Class,
        Label::Teacher,
        Label::Assistant,
        Label::Lesson,
    ];

    /// Literal label text
    pub fn text(self) -> &'static str {
        match self {
            Self::Time => "時間",
            Self::Class => "班級",
            Self::Teacher => "講師",
            Self::Assistant => "助教",
            Self::Lesson => "教案",
        }
    }

    /// Whether a description may omit this segment
    pub fn is_optional(self) -> bool {
        matches!(self, Self::Assistant)
    }
}

/// Position of a label anchor in the description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub label: Label,
    /// Byte offset of the label text
    pub start: usize,
    /// Byte offset just past the colon
    pub end: usize,
}

/// Raw payload of every segment, trimmed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Segments<'a> {
    pub time: &'a str,
    pub class: &'a str,
    pub teacher: &'a str,
    pub assistant: Option<&'a str>,
    pub lesson: &'a str,
}

/// Find the first anchor for `label` at or after byte offset `from`
pub fn find_anchor(text: &str, label: Label, from: usize) -> Option<Anchor> {
    let needle = label.text();
    let mut cursor = from;

    while let Some(offset) = text.get(cursor..)?.find(needle) {
        let start = cursor + offset;
        let after = start + needle.len();
        let rest = &text[after..];
        let trimmed = rest.trim_start_matches(|c: char| c == ' ' || c == '\t');
        let skipped = rest.len() - trimmed.len();

        if let Some(colon) = trimmed.chars().next().filter(|c| *c == ':' || *c == '：') {
            return Some(Anchor {
                label,
                start,
                end: after + skipped + colon.len_utf8(),
            });
        }
        cursor = after;
    }

    None
}

/// Split a description into its labeled segments
///
/// Required labels must appear in order. The optional assistant label is only
/// searched for between the teacher anchor and the next required anchor.
pub fn split_segments(text: &str) -> Result<Segments<'_>, ParseError> {
    let mut anchors: Vec<Anchor> = Vec::with_capacity(Label::ORDER.len());
    let mut cursor = 0;

    for (idx, label) in Label::ORDER.iter().copied().enumerate() {
        if label.is_optional() {
            let limit = Label::ORDER[idx + 1..]
                .iter()
                .find(|next| !next.is_optional())
                .and_then(|next| find_anchor(text, *next, cursor))
                .map(|next| next.start)
                .unwrap_or(text.len());

            if let Some(anchor) = find_anchor(&text[..limit], label, cursor) {
                cursor = anchor.end;
                anchors.push(anchor);
            }
            continue;
        }

        let anchor =
            find_anchor(text, label, cursor).ok_or(ParseError::MissingLabel(label.text()))?;
        cursor = anchor.end;
        anchors.push(anchor);
    }

    let mut segments = Segments::default();
    for (idx, anchor) in anchors.iter().enumerate() {
        let end = anchors
            .get(idx + 1)
            .map(|next| next.start)
            .unwrap_or(text.len());
        let payload = text[anchor.end..end].trim();

        match anchor.label {
            Label::Time => segments.time = payload,
            Label::Class => segments.class = payload,
            Label::Teacher => segments.teacher = payload,
            Label::Assistant => segments.assistant = Some(payload),
            Label::Lesson => segments.lesson = payload,
        }
    }

    Ok(segments)
}
