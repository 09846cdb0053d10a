//! Reminder scheduling
//!
//! Two independent timers drive the service:
//!
//! - **Lookahead scan** (every `scan_interval_secs`): events starting within
//!   `(min_lead, max_lead]` get a reminder pushed to every resolved recipient,
//!   once per (event, recipient) pair.
//! - **Daily digest** (at `digest_time` in the configured zone): every
//!   recipient gets one message listing today's events.
//!
//! ```text
//!   ┌──────────────┐     ┌──────────┐     ┌────────────────┐
//!   │ CalendarSrc  │────▶│  Parser  │────▶│ RecipientRes.  │
//!   └──────────────┘     └──────────┘     └───────┬────────┘
//!                                                 │
//!   ┌──────────────┐     ┌──────────┐     ┌───────▼────────┐
//!   │   Ledger     │◀────│Dispatcher│◀────│   Composer     │
//!   └──────────────┘     └──────────┘     └────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`service`] - `NotifierService`, the tick logic and timer loops
//! - [`trigger`] - Timer configuration, lookahead window and daily trigger
//! - [`ledger`] - Delivered (event, recipient) pairs
//! - [`error`] - Scheduler error type

pub mod error;
pub mod ledger;
pub mod service;
pub mod trigger;

pub use error::{SchedulerError, SchedulerResult};
pub use ledger::NotificationLedger;
pub use service::{DigestReport, LookaheadReport, NotifierService, ServiceSettings, SystemCheck};
pub use trigger::{DailyTrigger, LookaheadWindow, TriggerConfig, TriggerConfigBuilder};
