//! coursebell - calendar-driven class reminders
//!
//! Watches a set of CalDAV calendars (one per staff member), reads the
//! labelled description of each class event, resolves the people named in it
//! against a roster and pushes LINE reminders shortly before class plus a
//! morning digest.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`calendar`] - Calendar store access (CalDAV) and iCalendar conversion
//! - [`parser`] - Labelled event description parsing
//! - [`roster`] - Roster store, name resolution and recipient sets
//! - [`notifications`] - Message composition, transports and fan-out
//! - [`scheduler`] - Lookahead and digest timers, the notifier service
//! - [`config`] - Configuration management and settings
//! - [`metrics`] - Prometheus metrics and the health endpoint
//! - [`utils`] - Common utilities and leaf error types
//!
//! # Example
//!
//! ```no_run
//! use coursebell::parser;
//!
//! let record = parser::parse(
//!     "時間：20250301 10:00-12:00\n班級：Robotics A\n講師：GILLIAN\n教案：intro",
//! )?;
//! assert_eq!(record.date, "2025/03/01");
//! # Ok::<(), coursebell::error::ParseError>(())
//! ```

pub mod calendar;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notifications;
pub mod parser;
pub mod roster;
pub mod scheduler;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::calendar::{CalendarEvent, CalendarSource};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, NotifierErrorTrait, Result};
    pub use crate::notifications::{Dispatcher, MessageComposer, MessagingTransport, OutboundMessage};
    pub use crate::parser::{DescriptionParser, ParsedCourseRecord};
    pub use crate::roster::{NameResolver, RecipientResolver, RosterSource};
    pub use crate::scheduler::NotifierService;
}
