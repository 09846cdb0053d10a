//! Timer configuration for the lookahead scan and the daily digest

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::error::{SchedulerError, SchedulerResult};
use crate::notifications::compose::DEFAULT_CHECKIN_URL;

// ============================================================================
// Trigger Configuration
// ============================================================================

/// Configuration for the two scheduler timers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Seconds between lookahead scans
    pub scan_interval_secs: u64,

    /// Lower bound (exclusive) of the lookahead window, in minutes
    pub min_lead_minutes: i64,

    /// Upper bound (inclusive) of the lookahead window, in minutes
    pub max_lead_minutes: i64,

    /// Time of the daily digest (24h format, e.g. "08:00")
    pub digest_time: String,

    /// Whether the digest timer runs at all
    pub digest_enabled: bool,

    /// Timezone for the digest time and "today" (e.g. "Asia/Taipei")
    pub timezone: String,

    /// Check-in page linked from reminders
    pub checkin_url: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 60,
            min_lead_minutes: 1,
            max_lead_minutes: 30,
            digest_time: "08:00".to_string(),
            digest_enabled: true,
            timezone: "Asia/Taipei".to_string(),
            checkin_url: DEFAULT_CHECKIN_URL.to_string(),
        }
    }
}

impl TriggerConfig {
    /// Create a new config builder
    pub fn builder() -> TriggerConfigBuilder {
        TriggerConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> SchedulerResult<()> {
        self.parse_digest_time()?;
        self.tz()?;

        if self.scan_interval_secs == 0 {
            return Err(SchedulerError::trigger_config(
                "scan_interval_secs",
                "Scan interval must be greater than 0",
            ));
        }

        if self.min_lead_minutes < 0 || self.max_lead_minutes <= self.min_lead_minutes {
            return Err(SchedulerError::trigger_config(
                "max_lead_minutes",
                format!(
                    "Lookahead window ({}, {}] is empty",
                    self.min_lead_minutes, self.max_lead_minutes
                ),
            ));
        }

        Ok(())
    }

    /// Parse the digest time
    pub fn parse_digest_time(&self) -> SchedulerResult<NaiveTime> {
        NaiveTime::parse_from_str(&self.digest_time, "%H:%M").map_err(|_| {
            SchedulerError::trigger_config(
                "digest_time",
                format!("Invalid time format '{}'. Expected HH:MM", self.digest_time),
            )
        })
    }

    /// Parse the timezone
    pub fn tz(&self) -> SchedulerResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| SchedulerError::invalid_timezone(&self.timezone))
    }

    /// Lookahead window described by this config
    pub fn window(&self) -> LookaheadWindow {
        LookaheadWindow::new(
            Duration::minutes(self.min_lead_minutes),
            Duration::minutes(self.max_lead_minutes),
        )
    }

    /// Scan period
    pub fn scan_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.scan_interval_secs)
    }

    /// Digest trigger described by this config
    pub fn daily_trigger(&self) -> SchedulerResult<DailyTrigger> {
        Ok(DailyTrigger::new(self.parse_digest_time()?, self.tz()?))
    }
}

/// Builder for TriggerConfig
#[derive(Debug, Default)]
pub struct TriggerConfigBuilder {
    scan_interval_secs: Option<u64>,
    min_lead_minutes: Option<i64>,
    max_lead_minutes: Option<i64>,
    digest_time: Option<String>,
    digest_enabled: Option<bool>,
    timezone: Option<String>,
    checkin_url: Option<String>,
}

impl TriggerConfigBuilder {
    /// Set scan interval
    pub fn scan_interval_secs(mut self, secs: u64) -> Self {
        self.scan_interval_secs = Some(secs);
        self
    }

    /// Set lookahead window bounds in minutes
    pub fn lead_minutes(mut self, min: i64, max: i64) -> Self {
        self.min_lead_minutes = Some(min);
        self.max_lead_minutes = Some(max);
        self
    }

    /// Set digest time
    pub fn digest_time(mut self, time: impl Into<String>) -> Self {
        self.digest_time = Some(time.into());
        self
    }

    /// Enable or disable the digest timer
    pub fn digest_enabled(mut self, value: bool) -> Self {
        self.digest_enabled = Some(value);
        self
    }

    /// Set timezone
    pub fn timezone(mut self, tz: impl Into<String>) -> Self {
        self.timezone = Some(tz.into());
        self
    }

    /// Set check-in link
    pub fn checkin_url(mut self, url: impl Into<String>) -> Self {
        self.checkin_url = Some(url.into());
        self
    }

    /// Build the config
    pub fn build(self) -> SchedulerResult<TriggerConfig> {
        let defaults = TriggerConfig::default();
        let config = TriggerConfig {
            scan_interval_secs: self.scan_interval_secs.unwrap_or(defaults.scan_interval_secs),
            min_lead_minutes: self.min_lead_minutes.unwrap_or(defaults.min_lead_minutes),
            max_lead_minutes: self.max_lead_minutes.unwrap_or(defaults.max_lead_minutes),
            digest_time: self.digest_time.unwrap_or(defaults.digest_time),
            digest_enabled: self.digest_enabled.unwrap_or(defaults.digest_enabled),
            timezone: self.timezone.unwrap_or(defaults.timezone),
            checkin_url: self.checkin_url.unwrap_or(defaults.checkin_url),
        };
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Lookahead Window
// ============================================================================

/// Span before an event's start during which a reminder may fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookaheadWindow {
    min_lead: Duration,
    max_lead: Duration,
}

impl LookaheadWindow {
    pub fn new(min_lead: Duration, max_lead: Duration) -> Self {
        Self { min_lead, max_lead }
    }

    /// `min_lead < start - now <= max_lead`
    pub fn contains(&self, now: DateTime<Utc>, start: DateTime<Utc>) -> bool {
        let delta = start - now;
        delta > self.min_lead && delta <= self.max_lead
    }

    /// Fetch range `[from, to)` covering every start the window accepts
    pub fn fetch_range(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now + self.min_lead, now + self.max_lead + Duration::seconds(1))
    }
}

impl Default for LookaheadWindow {
    fn default() -> Self {
        Self::new(Duration::minutes(1), Duration::minutes(30))
    }
}

// ============================================================================
// Daily Trigger
// ============================================================================

/// Fires once a day at a wall-clock time in a fixed zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTrigger {
    at: NaiveTime,
    tz: Tz,
}

impl DailyTrigger {
    pub fn new(at: NaiveTime, tz: Tz) -> Self {
        Self { at, tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Next firing instant strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.with_timezone(&self.tz).date_naive();

        (0..=2)
            .filter_map(|offset| {
                let date = today + Duration::days(offset);
                self.tz
                    .from_local_datetime(&date.and_time(self.at))
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
            })
            .find(|target| *target > now)
            .unwrap_or_else(|| now + Duration::days(1))
    }

    /// Time to sleep until the next firing
    pub fn duration_until_next(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.next_after(now) - now)
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(60))
    }
}

// ============================================================================
// Tests
// ============================================================================
