//! Notifier service: lookahead reminders and the daily digest

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;

use super::error::{SchedulerError, SchedulerResult};
use super::ledger::NotificationLedger;
use super::trigger::{DailyTrigger, LookaheadWindow, TriggerConfig};
use crate::calendar::{fetch_all_events, CalendarEvent, CalendarSource};
use crate::metrics;
use crate::notifications::{Dispatcher, MessageComposer};
use crate::parser::DescriptionParser;
use crate::roster::RecipientResolver;

/// How long delivered reminders are remembered
const LEDGER_RETENTION_HOURS: i64 = 24;

/// Timing settings of the service
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub window: LookaheadWindow,
    pub scan_interval: std::time::Duration,
    pub digest: Option<DailyTrigger>,
    pub tz: Tz,
}

impl ServiceSettings {
    pub fn from_trigger(config: &TriggerConfig) -> SchedulerResult<Self> {
        config.validate()?;
        Ok(Self {
            window: config.window(),
            scan_interval: config.scan_interval(),
            digest: if config.digest_enabled {
                Some(config.daily_trigger()?)
            } else {
                None
            },
            tz: config.tz()?,
        })
    }
}

/// Outcome of one lookahead tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LookaheadReport {
    /// Events fetched for the window range
    pub events_fetched: usize,
    /// Events whose start is inside the window
    pub events_in_window: usize,
    /// Events skipped because the description did not parse
    pub parse_failures: usize,
    /// Events with no resolvable recipient
    pub without_recipients: usize,
    /// Events whose recipients were all notified earlier
    pub already_notified: usize,
    /// Successful deliveries
    pub delivered: usize,
    /// Failed deliveries
    pub failed: usize,
}

impl fmt::Display for LookaheadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fetched, {} in window, {} delivered, {} failed, {} unparsed, {} without recipients, {} already notified",
            self.events_fetched,
            self.events_in_window,
            self.delivered,
            self.failed,
            self.parse_failures,
            self.without_recipients,
            self.already_notified
        )
    }
}

/// Outcome of one digest run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DigestReport {
    /// Timed events found for today
    pub events: usize,
    /// Recipients with at least one event
    pub recipients: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl fmt::Display for DigestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} events, {} recipients, {} delivered, {} failed",
            self.events, self.recipients, self.delivered, self.failed
        )
    }
}

/// Result of a connectivity check against every collaborator
#[derive(Debug, Clone, Serialize)]
pub struct SystemCheck {
    /// Number of calendars, or the error
    pub calendar: Result<usize, String>,
    /// Number of roster entries after a forced reload, or the error
    pub roster: Result<usize, String>,
    /// Transport health, or the error
    pub transport: Result<bool, String>,
}

impl SystemCheck {
    pub fn is_healthy(&self) -> bool {
        self.calendar.is_ok() && self.roster.is_ok() && matches!(self.transport, Ok(true))
    }
}

impl fmt::Display for SystemCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.calendar {
            Ok(n) => writeln!(f, "✅ Calendar store reachable ({n} calendars)")?,
            Err(e) => writeln!(f, "❌ Calendar store failed: {e}")?,
        }
        match &self.roster {
            Ok(n) => writeln!(f, "✅ Roster loaded ({n} entries)")?,
            Err(e) => writeln!(f, "❌ Roster failed: {e}")?,
        }
        match &self.transport {
            Ok(true) => write!(f, "✅ Messaging transport healthy"),
            Ok(false) => write!(f, "❌ Messaging transport unhealthy"),
            Err(e) => write!(f, "❌ Messaging transport failed: {e}"),
        }
    }
}

/// The single service object driving reminders and digests
///
/// Constructed once at startup. The roster cache (inside the resolver) and
/// the ledger are the only mutable state, both behind async mutexes.
pub struct NotifierService {
    calendar: Arc<dyn CalendarSource>,
    parser: DescriptionParser,
    recipients: RecipientResolver,
    dispatcher: Dispatcher,
    composer: MessageComposer,
    ledger: Mutex<NotificationLedger>,
    settings: ServiceSettings,
}

impl NotifierService {
    pub fn new(
        calendar: Arc<dyn CalendarSource>,
        parser: DescriptionParser,
        recipients: RecipientResolver,
        dispatcher: Dispatcher,
        composer: MessageComposer,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            calendar,
            parser,
            recipients,
            dispatcher,
            composer,
            ledger: Mutex::new(NotificationLedger::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn recipients(&self) -> &RecipientResolver {
        &self.recipients
    }

    /// Number of delivered (event, recipient) pairs remembered
    pub async fn ledger_len(&self) -> usize {
        self.ledger.lock().await.len()
    }

    // ========================================================================
    // Lookahead
    // ========================================================================

    /// Send reminders for events starting inside the lookahead window
    ///
    /// A calendar fetch failure aborts the tick. Every other failure is
    /// confined to its event, name or recipient.
    pub async fn run_lookahead(&self, now: DateTime<Utc>) -> SchedulerResult<LookaheadReport> {
        let _timer = metrics::start_tick_timer("lookahead");
        let mut report = LookaheadReport::default();

        let pruned = self
            .ledger
            .lock()
            .await
            .prune_before(now - Duration::hours(LEDGER_RETENTION_HOURS));
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned notification ledger");
        }

        let (from, to) = self.settings.window.fetch_range(now);
        let events = fetch_all_events(self.calendar.as_ref(), from, to)
            .await
            .inspect_err(|e| {
                metrics::record_calendar_fetch_failure();
                tracing::error!(error = %e, "Calendar fetch failed, skipping tick");
            })?;
        report.events_fetched = events.len();

        let upcoming: Vec<&CalendarEvent> = events
            .iter()
            .filter(|e| !e.all_day && self.settings.window.contains(now, e.start))
            .collect();
        report.events_in_window = upcoming.len();
        if upcoming.is_empty() {
            tracing::debug!("No upcoming events");
            return Ok(report);
        }

        let snapshot = self.recipients.name_resolver().snapshot(false).await;

        for event in upcoming {
            let record = match self.parser.parse(&event.description) {
                Ok(record) => record,
                Err(e) => {
                    metrics::record_parse_failure();
                    tracing::warn!(
                        event_id = %event.id,
                        calendar = %event.calendar_label,
                        title = %event.title,
                        error = %e,
                        "Skipping event with unparseable description"
                    );
                    report.parse_failures += 1;
                    continue;
                }
            };

            let set = self
                .recipients
                .resolve_with(&snapshot, &event.calendar_label, &record);
            if set.is_empty() {
                tracing::warn!(event_id = %event.id, calendar = %event.calendar_label, "No recipients resolved");
                report.without_recipients += 1;
                continue;
            }

            let pending: Vec<&str> = {
                let ledger = self.ledger.lock().await;
                set.addresses()
                    .filter(|address| !ledger.is_notified(&event.id, address))
                    .collect()
            };
            if pending.is_empty() {
                tracing::debug!(event_id = %event.id, "All recipients already notified");
                report.already_notified += 1;
                continue;
            }

            tracing::info!(
                event_id = %event.id,
                title = %event.title,
                minutes_to_start = (event.start - now).num_minutes(),
                recipients = pending.len(),
                "Dispatching reminder"
            );

            let message = self.composer.reminder(event, &record);
            let outcome = self.dispatcher.dispatch_to(&pending, &message).await;

            let mut ledger = self.ledger.lock().await;
            for address in &outcome.delivered {
                ledger.record(&event.id, address, now);
            }
            report.delivered += outcome.delivered.len();
            report.failed += outcome.failed.len();
        }

        tracing::info!(%report, "Lookahead tick finished");
        Ok(report)
    }

    // ========================================================================
    // Digest
    // ========================================================================

    /// Send each recipient one message listing today's events
    pub async fn run_digest(&self, now: DateTime<Utc>) -> SchedulerResult<DigestReport> {
        let _timer = metrics::start_tick_timer("digest");
        let mut report = DigestReport::default();

        let (from, to) = local_day_bounds(now, self.settings.tz);
        let events = fetch_all_events(self.calendar.as_ref(), from, to)
            .await
            .inspect_err(|e| {
                metrics::record_calendar_fetch_failure();
                tracing::error!(error = %e, "Calendar fetch failed, skipping digest");
            })?;

        let today: Vec<&CalendarEvent> = events.iter().filter(|e| !e.all_day).collect();
        report.events = today.len();
        if today.is_empty() {
            tracing::info!("No events today, digest skipped");
            return Ok(report);
        }

        let snapshot = self.recipients.name_resolver().snapshot(false).await;

        // recipient address -> events, in first-seen order
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<&CalendarEvent>> = HashMap::new();

        for event in today {
            let set = match self.parser.parse(&event.description) {
                Ok(record) => self
                    .recipients
                    .resolve_with(&snapshot, &event.calendar_label, &record),
                Err(e) => {
                    tracing::debug!(event_id = %event.id, error = %e, "Digest falls back to calendar owner");
                    self.recipients
                        .resolve_owner_with(&snapshot, &event.calendar_label)
                }
            };

            for address in set.addresses() {
                groups
                    .entry(address.to_string())
                    .or_insert_with(|| {
                        order.push(address.to_string());
                        Vec::new()
                    })
                    .push(event);
            }
        }

        report.recipients = order.len();

        for address in &order {
            let Some(message) = groups
                .get(address)
                .and_then(|events| self.composer.digest(events))
            else {
                continue;
            };

            let outcome = self.dispatcher.dispatch_to(&[address.as_str()], &message).await;
            report.delivered += outcome.delivered.len();
            report.failed += outcome.failed.len();
        }

        tracing::info!(%report, "Digest finished");
        Ok(report)
    }

    // ========================================================================
    // System check
    // ========================================================================

    /// Probe the calendar store, the roster store and the transport
    pub async fn check(&self) -> SystemCheck {
        let calendar = self
            .calendar
            .list_calendars()
            .await
            .map(|c| c.len())
            .map_err(|e| e.to_string());

        let roster = self
            .recipients
            .name_resolver()
            .reload()
            .await
            .map_err(|e| e.to_string());

        let transport = self
            .dispatcher
            .transport()
            .health_check()
            .await
            .map_err(|e| e.to_string());

        SystemCheck {
            calendar,
            roster,
            transport,
        }
    }

    // ========================================================================
    // Timers
    // ========================================================================

    /// Run both timers until `shutdown` resolves
    ///
    /// Ticks of one timer never overlap; the two timers run independently.
    /// A tick already in progress at shutdown is allowed to finish.
    pub async fn run<F>(self: Arc<Self>, shutdown: F) -> SchedulerResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut handles = vec![tokio::spawn(
            Arc::clone(&self).lookahead_loop(stop_rx.clone()),
        )];
        if let Some(trigger) = self.settings.digest {
            handles.push(tokio::spawn(
                Arc::clone(&self).digest_loop(trigger, stop_rx),
            ));
        }

        tracing::info!(
            scan_interval_secs = self.settings.scan_interval.as_secs(),
            digest = self.settings.digest.is_some(),
            "Scheduler started"
        );

        shutdown.await;
        tracing::info!("Shutdown requested, waiting for running ticks");
        let _ = stop_tx.send(true);

        for handle in handles {
            handle
                .await
                .map_err(|e| SchedulerError::TriggerExecutionFailed {
                    reason: e.to_string(),
                })?;
        }

        tracing::info!("Scheduler stopped");
        Ok(())
    }

    async fn lookahead_loop(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.settings.scan_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = stop.changed() => break,
            }
            if *stop.borrow() {
                break;
            }

            if let Err(e) = self.run_lookahead(Utc::now()).await {
                tracing::warn!(error = %e, recoverable = e.is_recoverable(), "Lookahead tick failed");
            }
        }
    }

    async fn digest_loop(self: Arc<Self>, trigger: DailyTrigger, mut stop: watch::Receiver<bool>) {
        loop {
            let wait = trigger.duration_until_next(Utc::now());
            tracing::debug!(seconds = wait.as_secs(), "Next digest scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = stop.changed() => break,
            }
            if *stop.borrow() {
                break;
            }

            if let Err(e) = self.run_digest(Utc::now()).await {
                tracing::warn!(error = %e, recoverable = e.is_recoverable(), "Digest failed");
            }
        }
    }
}

/// UTC bounds of the local calendar day containing `now`
fn local_day_bounds(now: DateTime<Utc>, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.with_timezone(&tz).date_naive();
    let start_of = |date: chrono::NaiveDate| {
        date.and_hms_opt(0, 0, 0)
            .and_then(|midnight| tz.from_local_datetime(&midnight).earliest())
            .map(|dt| dt.with_timezone(&Utc))
    };

    let from = start_of(today).unwrap_or(now - Duration::hours(12));
    let to = start_of(today + Duration::days(1)).unwrap_or(from + Duration::days(1));
    (from, to)
}
