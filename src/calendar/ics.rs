//! iCalendar payload to [`CalendarEvent`] conversion

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::{
    parser::{read_calendar, unfold, Component},
    CalendarDateTime, DatePerhapsTime,
};

use super::CalendarEvent;

/// Parse every VEVENT in an iCalendar payload
///
/// Floating and date-only values are read in `default_tz`. Events without a
/// UID or a usable DTSTART are skipped. A payload that is not iCalendar at all
/// (an XML error body, for instance) yields no events.
pub fn parse_events(ics: &str, calendar_label: &str, default_tz: Tz) -> Vec<CalendarEvent> {
    if !ics.trim_start().starts_with("BEGIN:VCALENDAR") {
        tracing::warn!(
            calendar = %calendar_label,
            payload = %crate::utils::truncate_text(ics.trim(), 80),
            "Skipping non-iCalendar payload"
        );
        return Vec::new();
    }

    let unfolded = unfold(ics);
    let calendar = match read_calendar(&unfolded) {
        Ok(calendar) => calendar,
        Err(e) => {
            tracing::warn!(calendar = %calendar_label, error = %e, "Failed to parse iCalendar payload");
            return Vec::new();
        }
    };

    calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .filter_map(|vevent| to_event(vevent, calendar_label, default_tz))
        .collect()
}

fn to_event(vevent: &Component<'_>, calendar_label: &str, tz: Tz) -> Option<CalendarEvent> {
    let uid = vevent.find_prop("UID")?.val.to_string();

    let (start, all_day) = match vevent
        .find_prop("DTSTART")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .and_then(|dpt| to_utc(dpt, tz))
    {
        Some(value) => value,
        None => {
            tracing::debug!(uid = %uid, "Skipping event without usable DTSTART");
            return None;
        }
    };

    let end = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .and_then(|dpt| to_utc(dpt, tz))
        .map(|(end, _)| end)
        .unwrap_or(start);

    let id = match vevent.find_prop("RECURRENCE-ID") {
        Some(rid) => format!("{uid}#{}", rid.val.as_ref()),
        None => uid,
    };

    let title = vevent
        .find_prop("SUMMARY")
        .map(|p| unescape_text(p.val.as_ref()))
        .unwrap_or_default();
    let description = vevent
        .find_prop("DESCRIPTION")
        .map(|p| unescape_text(p.val.as_ref()))
        .unwrap_or_default();
    let location = vevent
        .find_prop("LOCATION")
        .map(|p| unescape_text(p.val.as_ref()))
        .filter(|l| !l.trim().is_empty());

    Some(CalendarEvent {
        id,
        calendar_label: calendar_label.to_string(),
        title,
        start,
        end,
        all_day,
        description,
        location,
    })
}

/// Convert a start/end value to UTC; the flag marks date-only values
fn to_utc(value: DatePerhapsTime, tz: Tz) -> Option<(DateTime<Utc>, bool)> {
    match value {
        DatePerhapsTime::Date(date) => {
            let midnight = date.and_hms_opt(0, 0, 0)?;
            from_local(midnight, tz).map(|dt| (dt, true))
        }
        DatePerhapsTime::DateTime(dt) => match dt {
            CalendarDateTime::Utc(dt) => Some((dt, false)),
            CalendarDateTime::Floating(naive) => from_local(naive, tz).map(|dt| (dt, false)),
            CalendarDateTime::WithTimezone { date_time, tzid } => {
                let zone = match tzid.parse::<Tz>() {
                    Ok(zone) => zone,
                    Err(_) => {
                        tracing::debug!(tzid = %tzid, fallback = %tz, "Unknown TZID");
                        tz
                    }
                };
                from_local(date_time, zone).map(|dt| (dt, false))
            }
        },
    }
}

fn from_local(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Undo RFC 5545 TEXT escaping
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Taipei;

    const TWO_EVENTS: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//test//EN\r\n\
BEGIN:VEVENT\r\n\
UID:evt-1\r\n\
DTSTART;TZID=Asia/Taipei:20250101T090000\r\n\
DTEND;TZID=Asia/Taipei:20250101T100000\r\n\
SUMMARY:ABC 班\r\n\
DESCRIPTION:時間: 20250101 0900-1000 班級:ABC\\n講師: TIM\\, ALICE 教案: Algebra\r\n\
LOCATION:台北市信義區\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:evt-2\r\n\
DTSTART;VALUE=DATE:20250102\r\n\
SUMMARY:Holiday\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[test]
    fn test_parse_events() {
        let events = parse_events(TWO_EVENTS, "TIM", Taipei);
        assert_eq!(events.len(), 2);

        let first = &events[0];
        assert_eq!(first.id, "evt-1");
        assert_eq!(first.calendar_label, "TIM");
        assert_eq!(first.start.to_rfc3339(), "2025-01-01T01:00:00+00:00");
        assert_eq!(first.end.to_rfc3339(), "2025-01-01T02:00:00+00:00");
        assert!(!first.all_day);
        assert!(first.description.contains("講師: TIM, ALICE"));
        assert!(first.description.contains('\n'));
        assert_eq!(first.location.as_deref(), Some("台北市信義區"));

        let second = &events[1];
        assert!(second.all_day);
        assert_eq!(second.start, second.end);
        assert_eq!(second.start.to_rfc3339(), "2025-01-01T16:00:00+00:00");
        assert_eq!(second.location, None);
    }

    #[test]
    fn test_utc_and_floating_times() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:u\r\n\
DTSTART:20250101T010000Z\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:f\r\n\
DTSTART:20250101T090000\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";
        let events = parse_events(ics, "TIM", Taipei);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].start, events[1].start);
    }

    #[test]
    fn test_non_calendar_payload() {
        let xml = "<?xml version=\"1.0\"?><error>Forbidden</error>";
        assert!(parse_events(xml, "TIM", Taipei).is_empty());
    }

    #[test]
    fn test_unescape_text() {
        assert_eq!(unescape_text(r"a\, b\; c\\d\nx"), "a, b; c\\d\nx");
        assert_eq!(unescape_text("plain"), "plain");
    }
}
