//! Unified error handling for the coursebell crate
//!
//! Each concern keeps its own error enum; this module wraps them into a single
//! `Error` for callers crossing module boundaries.
//!
//! # Architecture
//!
//! - [`NotifierErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use coursebell::error::{Error, NotifierErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Will retry next tick: {}", err);
//!     } else {
//!         eprintln!("Fatal error ({}): {}", err.category(), err);
//!     }
//! }
//! ```

use std::fmt;
use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::notifications::ChannelError;
pub use crate::scheduler::error::SchedulerError;
pub use crate::utils::error::{FetchError, ParseError};

/// Common trait for all coursebell error types
pub trait NotifierErrorTrait: std::error::Error {
    /// Check if this error is recoverable (a later attempt may succeed)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Calendar or roster store unreachable or misbehaving
    Network,
    /// Event description or payload could not be understood
    Parsing,
    /// Messaging transport rejected or failed a push
    Delivery,
    /// Configuration and validation errors
    Config,
    /// Scheduler and timing errors
    Scheduler,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Delivery => "delivery",
            Self::Config => "config",
            Self::Scheduler => "scheduler",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the coursebell crate
#[derive(Error, Debug)]
pub enum Error {
    /// Calendar or roster fetch errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Description parse errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Messaging transport errors
    #[error("Delivery error: {0}")]
    Channel(#[from] ChannelError),

    /// Scheduler and timing errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl NotifierErrorTrait for FetchError {
    fn is_recoverable(&self) -> bool {
        FetchError::is_recoverable(self)
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidUrl(_) => ErrorCategory::Config,
            Self::Malformed(_) => ErrorCategory::Parsing,
            _ => ErrorCategory::Network,
        }
    }
}

impl NotifierErrorTrait for ParseError {
    // The description will not change by itself before the next tick.
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Parsing
    }
}

impl NotifierErrorTrait for ChannelError {
    fn is_recoverable(&self) -> bool {
        ChannelError::is_recoverable(self)
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfig(_) => ErrorCategory::Config,
            _ => ErrorCategory::Delivery,
        }
    }
}

impl NotifierErrorTrait for SchedulerError {
    fn is_recoverable(&self) -> bool {
        SchedulerError::is_recoverable(self)
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::CalendarFetch { .. } => ErrorCategory::Network,
            Self::TriggerConfigError { .. } | Self::InvalidTimezone { .. } => ErrorCategory::Config,
            Self::TriggerExecutionFailed { .. } => ErrorCategory::Scheduler,
        }
    }
}

impl NotifierErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => NotifierErrorTrait::is_recoverable(e),
            Self::Parse(e) => e.is_recoverable(),
            Self::Channel(e) => NotifierErrorTrait::is_recoverable(e),
            Self::Scheduler(e) => NotifierErrorTrait::is_recoverable(e),
            Self::Io(_) => true, // I/O errors are often transient
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) => e.category(),
            Self::Parse(e) => e.category(),
            Self::Channel(e) => e.category(),
            Self::Scheduler(e) => e.category(),
            Self::Io(_) => ErrorCategory::Other,
            Self::Json(_) => ErrorCategory::Parsing,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
