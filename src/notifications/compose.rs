//! Reminder and digest message composition

use chrono_tz::Tz;

use super::{LocationAttachment, OutboundMessage, QuickActionToken};
use crate::calendar::CalendarEvent;
use crate::parser::ParsedCourseRecord;

/// Check-in page linked from every reminder
pub const DEFAULT_CHECKIN_URL: &str = "https://liff.line.me/1657746214-wPgd2qQn";

/// Builds the outbound messages for reminders and digests
#[derive(Debug, Clone)]
pub struct MessageComposer {
    checkin_url: String,
    tz: Tz,
}

impl MessageComposer {
    pub fn new(checkin_url: impl Into<String>, tz: Tz) -> Self {
        Self {
            checkin_url: checkin_url.into(),
            tz,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Confirmation token for an event, before an answer is chosen
    pub fn token(&self, event: &CalendarEvent, record: &ParsedCourseRecord) -> QuickActionToken {
        QuickActionToken {
            owner: event.calendar_label.clone(),
            event_title: event.title.clone(),
            class_name: record.class_name.clone(),
            date: record.date.clone(),
            time_range: record.time_range.clone(),
            assistants: record.assistants.clone(),
            tier: 0,
            attended: true,
        }
    }

    /// Reminder for an upcoming class
    pub fn reminder(&self, event: &CalendarEvent, record: &ParsedCourseRecord) -> OutboundMessage {
        let teachers = if record.teachers.is_empty() {
            "無".to_string()
        } else {
            record.teachers.join("、")
        };
        let assistants = if record.assistants.is_empty() {
            "無".to_string()
        } else {
            record.assistants.join("、")
        };

        let mut lines = vec![
            "🔔 半小時後即將開始的課程！！！".to_string(),
            format!("📅 課程時間：{} {}", record.date, record.time_range),
            format!("📚 課程名稱：{}", record.class_name),
            format!("👨‍🏫 講師：{teachers}"),
            format!("👨‍💼 助教：{assistants}"),
        ];
        if !record.lesson_summary.is_empty() {
            lines.push(format!("📖 教案：{}", record.lesson_summary));
        }
        if let Some(link) = &record.lesson_link {
            lines.push(format!("🔗 課程連結：{link}"));
        }
        if !self.checkin_url.is_empty() {
            lines.push(format!("📝 簽到連結：{}", self.checkin_url));
        }

        let mut message = OutboundMessage::text(lines.join("\n"))
            .with_quick_actions(self.token(event, record).replies());

        if let Some(location) = &event.location {
            message = message.with_location(LocationAttachment::new(location.clone()));
        }

        message
    }

    /// Morning digest listing one recipient's events for the day
    ///
    /// Returns `None` when there is nothing to list.
    pub fn digest(&self, events: &[&CalendarEvent]) -> Option<OutboundMessage> {
        if events.is_empty() {
            return None;
        }

        let mut sorted: Vec<&CalendarEvent> = events.to_vec();
        sorted.sort_by_key(|e| e.start);

        let lines: Vec<String> = sorted
            .iter()
            .map(|e| format!("📅 {}：{}", e.title, e.local_start(self.tz).format("%H:%M")))
            .collect();

        Some(OutboundMessage::text(format!(
            "🌅 早安！今日課程提醒：\n{}",
            lines.join("\n")
        )))
    }
}

impl Default for MessageComposer {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKIN_URL, chrono_tz::Asia::Taipei)
    }
}
