//! Calendar source adapter
//!
//! Calendars are read fresh on every poll; nothing here is persisted. Each
//! calendar collection belongs to one person, and its display name (the
//! owner label) is resolved against the roster like any other name.

pub mod caldav;
pub mod ics;

pub use caldav::{CalDavSettings, CalDavSource};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::utils::error::FetchError;

/// A calendar collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarInfo {
    /// Collection path on the server
    pub href: String,
    /// Owner label (collection display name)
    pub label: String,
}

impl CalendarInfo {
    pub fn new(href: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            label: label.into(),
        }
    }
}

/// One event occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Stable identifier (UID, qualified by the recurrence id for instances)
    pub id: String,

    /// Owner label of the calendar the event came from
    pub calendar_label: String,

    /// Event summary
    pub title: String,

    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,

    /// Date-only event
    #[serde(default)]
    pub all_day: bool,

    /// Raw description text
    #[serde(default)]
    pub description: String,

    pub location: Option<String>,
}

impl CalendarEvent {
    /// Start time in the given zone
    pub fn local_start(&self, tz: Tz) -> DateTime<Tz> {
        self.start.with_timezone(&tz)
    }

    /// Whether the event starts in `[from, to)`
    pub fn starts_within(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.start >= from && self.start < to
    }
}

/// Read access to an external calendar store
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// List calendar collections
    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>, FetchError>;

    /// List all events of one calendar
    async fn list_events(&self, calendar: &CalendarInfo) -> Result<Vec<CalendarEvent>, FetchError>;

    /// List events of one calendar starting in `[start, end)`
    async fn list_events_between(
        &self,
        calendar: &CalendarInfo,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, FetchError> {
        let events = self.list_events(calendar).await?;
        Ok(events
            .into_iter()
            .filter(|event| event.starts_within(start, end))
            .collect())
    }
}

/// Collect events starting in `[start, end)` across every calendar
///
/// A calendar whose events cannot be fetched is logged and skipped. The call
/// fails when listing calendars fails or when every calendar failed.
pub async fn fetch_all_events(
    source: &dyn CalendarSource,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<CalendarEvent>, FetchError> {
    let calendars = source.list_calendars().await?;

    let mut events = Vec::new();
    let mut last_error = None;
    let mut succeeded = 0usize;

    for calendar in &calendars {
        match source.list_events_between(calendar, start, end).await {
            Ok(mut found) => {
                succeeded += 1;
                tracing::debug!(calendar = %calendar.label, events = found.len(), "Fetched events");
                events.append(&mut found);
            }
            Err(e) => {
                tracing::warn!(calendar = %calendar.label, href = %calendar.href, error = %e, "Failed to fetch calendar events");
                last_error = Some(e);
            }
        }
    }

    if succeeded == 0 {
        if let Some(e) = last_error {
            return Err(e);
        }
    }

    events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(id: &str, label: &str, start: DateTime<Utc>) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            calendar_label: label.to_string(),
            title: format!("Event {id}"),
            start,
            end: start,
            all_day: false,
            description: String::new(),
            location: None,
        }
    }

    struct TwoCalendars {
        fail_second: bool,
    }

    #[async_trait]
    impl CalendarSource for TwoCalendars {
        async fn list_calendars(&self) -> Result<Vec<CalendarInfo>, FetchError> {
            Ok(vec![
                CalendarInfo::new("/cal/tim/", "TIM"),
                CalendarInfo::new("/cal/bob/", "BOB"),
            ])
        }

        async fn list_events(
            &self,
            calendar: &CalendarInfo,
        ) -> Result<Vec<CalendarEvent>, FetchError> {
            let base = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
            match calendar.label.as_str() {
                "TIM" => Ok(vec![
                    event("t2", "TIM", base + chrono::Duration::hours(3)),
                    event("t1", "TIM", base),
                    event("t0", "TIM", base - chrono::Duration::days(2)),
                ]),
                _ if self.fail_second => Err(FetchError::Remote("down".to_string())),
                _ => Ok(vec![event("b1", "BOB", base + chrono::Duration::hours(1))]),
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_all_events_filters_and_sorts() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = start + chrono::Duration::days(1);
        let events = fetch_all_events(&TwoCalendars { fail_second: false }, start, end)
            .await
            .unwrap();
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "b1", "t2"]);
    }

    #[tokio::test]
    async fn test_fetch_all_events_skips_failed_calendar() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = start + chrono::Duration::days(1);
        let events = fetch_all_events(&TwoCalendars { fail_second: true }, start, end)
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.calendar_label == "TIM"));
    }

    #[test]
    fn test_local_start() {
        let e = event("x", "TIM", Utc.with_ymd_and_hms(2025, 1, 1, 0, 30, 0).unwrap());
        let local = e.local_start(chrono_tz::Asia::Taipei);
        assert_eq!(local.format("%Y/%m/%d %H:%M").to_string(), "2025/01/01 08:30");
    }
}
