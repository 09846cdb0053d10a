//! Course description parsing
//!
//! This module turns the free-text description of a calendar event into a
//! structured [`ParsedCourseRecord`]. Parsing never touches the network and
//! never panics; a description that does not follow the labeled layout yields
//! a [`ParseError`] and the caller skips the event.

pub mod labels;
pub mod names;

pub use labels::{split_segments, Label, Segments};
pub use names::{extract_names, NameFilter, NameList, DEFAULT_MIN_NAME_LEN, DEFAULT_NOISE_WORDS};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::utils::error::ParseError;
use crate::utils::{find_url, normalize_whitespace};

/// Structured course information extracted from an event description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCourseRecord {
    /// Course date as `YYYY/MM/DD`
    pub date: String,

    /// Time range, kept literally (e.g. `0900-1000` or `09:00-10:00`)
    pub time_range: String,

    /// Class name
    pub class_name: String,

    /// Teacher names in description order
    pub teachers: Vec<String>,

    /// Teacher reference link
    pub teacher_link: Option<String>,

    /// Assistant names in description order
    pub assistants: Vec<String>,

    /// Assistant reference link
    pub assistant_link: Option<String>,

    /// Lesson summary text
    pub lesson_summary: String,

    /// Lesson link
    pub lesson_link: Option<String>,
}

impl ParsedCourseRecord {
    /// Teachers followed by assistants
    pub fn instructors(&self) -> impl Iterator<Item = &str> {
        self.teachers
            .iter()
            .chain(self.assistants.iter())
            .map(String::as_str)
    }
}

/// Parser for labeled course descriptions
#[derive(Debug, Clone, Default)]
pub struct DescriptionParser {
    filter: NameFilter,
}

impl DescriptionParser {
    /// Create a parser with a custom name filter
    pub fn new(filter: NameFilter) -> Self {
        Self { filter }
    }

    /// Name filter in use
    pub fn filter(&self) -> &NameFilter {
        &self.filter
    }

    /// Parse a description into a course record
    pub fn parse(&self, text: &str) -> Result<ParsedCourseRecord, ParseError> {
        if text.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let segments = split_segments(text)?;

        let (date, time_range) = parse_time_segment(segments.time)?;

        let class_name = normalize_whitespace(segments.class);
        if class_name.is_empty() {
            return Err(ParseError::EmptyClass);
        }

        let teachers = extract_names(segments.teacher, &self.filter);
        let assistants = segments
            .assistant
            .map(|segment| extract_names(segment, &self.filter))
            .unwrap_or_default();

        if teachers.names.is_empty() && assistants.names.is_empty() {
            return Err(ParseError::NoInstructors);
        }

        let (lesson_summary, lesson_link) = split_lesson(segments.lesson);

        Ok(ParsedCourseRecord {
            date,
            time_range,
            class_name,
            teachers: teachers.names,
            teacher_link: teachers.link,
            assistants: assistants.names,
            assistant_link: assistants.link,
            lesson_summary,
            lesson_link,
        })
    }
}

/// Parse a description with the default name filter
pub fn parse(text: &str) -> Result<ParsedCourseRecord, ParseError> {
    static DEFAULT_PARSER: OnceLock<DescriptionParser> = OnceLock::new();
    DEFAULT_PARSER
        .get_or_init(DescriptionParser::default)
        .parse(text)
}

/// Split the time segment into a normalized date and the literal time range
fn parse_time_segment(segment: &str) -> Result<(String, String), ParseError> {
    let mut tokens = segment.split_whitespace();
    let date_token = tokens.next().ok_or(ParseError::MissingDate)?;
    let date = normalize_date(date_token)?;

    let time_range = tokens.collect::<Vec<_>>().join(" ");
    if time_range.is_empty() {
        return Err(ParseError::MissingTimeRange);
    }

    Ok((date, time_range))
}

/// Normalize a compact `YYYYMMDD` (or already separated) date to `YYYY/MM/DD`
pub fn normalize_date(token: &str) -> Result<String, ParseError> {
    let parsed = if token.len() == 8 && token.chars().all(|c| c.is_ascii_digit()) {
        NaiveDate::parse_from_str(token, "%Y%m%d")
    } else {
        NaiveDate::parse_from_str(token, "%Y/%m/%d")
            .or_else(|_| NaiveDate::parse_from_str(token, "%Y-%m-%d"))
    };

    parsed
        .map(|date| date.format("%Y/%m/%d").to_string())
        .map_err(|_| ParseError::InvalidDate(token.to_string()))
}

/// Separate the lesson link from the lesson summary
fn split_lesson(segment: &str) -> (String, Option<String>) {
    match find_url(segment) {
        Some((start, end)) => {
            let link = segment[start..end].to_string();
            let before = segment[..start]
                .trim_end()
                .trim_end_matches(|c: char| c == '(' || c == '（');
            let after = segment[end..]
                .trim_start_matches(|c: char| c == ')' || c == '）');
            let summary = normalize_whitespace(&format!("{before} {after}"));
            (summary, Some(link))
        }
        None => (normalize_whitespace(segment), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_teacher_no_assistant() {
        let record = parse(
            "時間: 20250101 0900-1000 班級:ABC 講師: TIM (http://x) 助教: (無) 教案: Algebra",
        )
        .unwrap();

        assert_eq!(record.date, "2025/01/01");
        assert_eq!(record.time_range, "0900-1000");
        assert_eq!(record.class_name, "ABC");
        assert_eq!(record.teachers, vec!["TIM"]);
        assert_eq!(record.teacher_link.as_deref(), Some("http://x"));
        assert!(record.assistants.is_empty());
        assert_eq!(record.lesson_summary, "Algebra");
        assert_eq!(record.lesson_link, None);
    }

    #[test]
    fn test_parse_multiple_teachers_and_assistant() {
        let record = parse(
            "時間: 20250101 0900-1000 班級:ABC 講師: TIM, ALICE (http://x) 助教: BOB (http://y) 教案: Algebra",
        )
        .unwrap();

        assert_eq!(record.teachers, vec!["TIM", "ALICE"]);
        assert_eq!(record.assistants, vec!["BOB"]);
        assert_eq!(record.assistant_link.as_deref(), Some("http://y"));
        let all: Vec<&str> = record.instructors().collect();
        assert_eq!(all, vec!["TIM", "ALICE", "BOB"]);
    }

    #[test]
    fn test_parse_missing_assistant_segment() {
        let record =
            parse("時間: 20250101 09:00-10:00 班級:ABC 講師: TIM 教案: Algebra").unwrap();
        assert!(record.assistants.is_empty());
        assert_eq!(record.time_range, "09:00-10:00");
    }

    #[test]
    fn test_parse_lesson_link() {
        let record = parse(
            "時間: 20250315 1330-1500 班級:SPM 講師: TIM 教案: Scratch 遊戲 (https://notion.so/lesson-1)",
        )
        .unwrap();
        assert_eq!(record.lesson_summary, "Scratch 遊戲");
        assert_eq!(record.lesson_link.as_deref(), Some("https://notion.so/lesson-1"));
        assert_eq!(record.date, "2025/03/15");
    }

    #[test]
    fn test_parse_failures() {
        assert_eq!(parse("   "), Err(ParseError::Empty));
        assert_eq!(
            parse("時間: 20251301 0900-1000 班級:ABC 講師: TIM 教案: X"),
            Err(ParseError::InvalidDate("20251301".to_string()))
        );
        assert_eq!(
            parse("時間: 20250101 班級:ABC 講師: TIM 教案: X"),
            Err(ParseError::MissingTimeRange)
        );
        assert_eq!(
            parse("時間: 20250101 0900-1000 班級: 講師: TIM 教案: X"),
            Err(ParseError::EmptyClass)
        );
        assert_eq!(
            parse("時間: 20250101 0900-1000 班級:ABC 講師: TBD 助教: 無 教案: X"),
            Err(ParseError::NoInstructors)
        );
        assert_eq!(
            parse("Team meeting"),
            Err(ParseError::MissingLabel("時間"))
        );
    }

    #[test]
    fn test_normalize_date_forms() {
        assert_eq!(normalize_date("20250101").unwrap(), "2025/01/01");
        assert_eq!(normalize_date("2025-01-02").unwrap(), "2025/01/02");
        assert_eq!(normalize_date("2025/1/3").unwrap(), "2025/01/03");
        assert!(normalize_date("tomorrow").is_err());
    }

    #[test]
    fn test_custom_filter_is_used() {
        let parser = DescriptionParser::new(NameFilter::new(2, ["pending"]));
        let record = parser
            .parse("時間: 20250101 0900-1000 班級:ABC 講師: BO, pending 教案: X")
            .unwrap();
        assert_eq!(record.teachers, vec!["BO"]);
    }
}
