//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use coursebell::calendar::{CalendarEvent, CalendarInfo, CalendarSource};
use coursebell::notifications::{
    ChannelError, ChannelResult, DeliveryStatus, Dispatcher, MessageComposer, MessagingTransport,
    OutboundMessage,
};
use coursebell::parser::DescriptionParser;
use coursebell::roster::{NameResolver, RecipientResolver, ResolverConfig, RosterRow, RosterSource};
use coursebell::scheduler::{NotifierService, ServiceSettings, TriggerConfig};
use coursebell::utils::error::FetchError;

/// Fixed reference instant: 2025-01-01 09:00 Asia/Taipei
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 1, 0, 0).unwrap()
}

pub const DESCRIPTION: &str =
    "時間: 20250101 0930-1030 班級:ABC 講師: TIM (http://x) 助教: BOB (http://y) 教案: Algebra";

/// Event owned by `owner` starting `minutes` after `now`
pub fn event_in(id: &str, owner: &str, now: DateTime<Utc>, minutes: i64, description: &str) -> CalendarEvent {
    let start = now + Duration::minutes(minutes);
    CalendarEvent {
        id: id.to_string(),
        calendar_label: owner.to_string(),
        title: format!("{owner} class"),
        start,
        end: start + Duration::hours(1),
        all_day: false,
        description: description.to_string(),
        location: Some("台北市大安區".to_string()),
    }
}

// ============================================================================
// Calendar fakes
// ============================================================================

/// In-memory calendar store; events are grouped by `calendar_label`
#[derive(Default)]
pub struct StaticCalendar {
    pub events: Mutex<Vec<CalendarEvent>>,
    pub failing_labels: Vec<String>,
    pub fail_listing: bool,
}

impl StaticCalendar {
    pub fn new(events: Vec<CalendarEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, label: &str) -> Self {
        self.failing_labels.push(label.to_string());
        self
    }

    pub fn unreachable() -> Self {
        Self {
            fail_listing: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl CalendarSource for StaticCalendar {
    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>, FetchError> {
        if self.fail_listing {
            return Err(FetchError::Remote("calendar store down".to_string()));
        }

        let mut labels: Vec<String> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.calendar_label.clone())
            .chain(self.failing_labels.iter().cloned())
            .collect();
        labels.sort();
        labels.dedup();

        Ok(labels
            .into_iter()
            .map(|label| CalendarInfo::new(format!("/cal/{label}/"), label))
            .collect())
    }

    async fn list_events(&self, calendar: &CalendarInfo) -> Result<Vec<CalendarEvent>, FetchError> {
        if self.failing_labels.contains(&calendar.label) {
            return Err(FetchError::Status {
                status: 500,
                url: calendar.href.clone(),
            });
        }

        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.calendar_label == calendar.label)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Roster fakes
// ============================================================================

/// Roster that always answers with the same rows
pub struct StaticRoster {
    rows: Vec<RosterRow>,
    pub calls: AtomicUsize,
}

impl StaticRoster {
    pub fn new(rows: &[(&str, &str)]) -> Self {
        Self {
            rows: rows.iter().map(|(n, a)| RosterRow::new(*n, *a)).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RosterSource for StaticRoster {
    async fn fetch_roster(&self) -> Result<Vec<RosterRow>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.clone())
    }
}

/// Default roster used by the service scenarios
pub fn default_roster() -> StaticRoster {
    StaticRoster::new(&[("TIM", "U-tim"), ("BOB", "U-bob"), ("ALICE", "U-alice")])
}

// ============================================================================
// Transport fakes
// ============================================================================

/// Transport recording every push; addresses in `failing` are rejected
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(String, OutboundMessage)>>,
    pub failing: Mutex<Vec<String>>,
    pub attempts: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, address: &str) {
        self.failing.lock().unwrap().push(address.to_string());
    }

    pub fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn sent_to(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(a, _)| a.clone()).collect()
    }

    pub fn messages_for(&self, address: &str) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| a == address)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

#[async_trait]
impl MessagingTransport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn push(&self, recipient: &str, message: &OutboundMessage) -> ChannelResult<DeliveryStatus> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().iter().any(|a| a == recipient) {
            return Err(ChannelError::Rejected {
                status: 400,
                body: "invalid user".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), message.clone()));
        Ok(DeliveryStatus::success(self.name(), recipient))
    }
}

// ============================================================================
// Service wiring
// ============================================================================

pub struct Harness {
    pub service: Arc<NotifierService>,
    pub calendar: Arc<StaticCalendar>,
    pub roster: Arc<StaticRoster>,
    pub transport: Arc<RecordingTransport>,
}

pub fn harness(calendar: StaticCalendar, roster: StaticRoster) -> Harness {
    let calendar = Arc::new(calendar);
    let roster = Arc::new(roster);
    let transport = Arc::new(RecordingTransport::new());

    let settings = ServiceSettings::from_trigger(&TriggerConfig::default()).unwrap();
    let names = Arc::new(NameResolver::new(roster.clone(), ResolverConfig::default()));
    let service = NotifierService::new(
        calendar.clone(),
        DescriptionParser::default(),
        RecipientResolver::new(names),
        Dispatcher::new(transport.clone()),
        MessageComposer::new("https://checkin.example.com", settings.tz),
        settings,
    );

    Harness {
        service: Arc::new(service),
        calendar,
        roster,
        transport,
    }
}
