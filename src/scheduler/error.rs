//! Error types for the scheduler module

use std::fmt;

use crate::utils::error::FetchError;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug)]
pub enum SchedulerError {
    /// Calendar store could not be read; the current tick is abandoned
    CalendarFetch {
        reason: String,
        recoverable: bool,
    },

    /// Trigger configuration error
    TriggerConfigError {
        field: String,
        reason: String,
    },

    /// Invalid timezone
    InvalidTimezone {
        tz: String,
    },

    /// Trigger execution error
    TriggerExecutionFailed {
        reason: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CalendarFetch { reason, .. } => {
                write!(f, "Calendar fetch failed: {}", reason)
            }
            Self::TriggerConfigError { field, reason } => {
                write!(f, "Trigger config error in '{}': {}", field, reason)
            }
            Self::InvalidTimezone { tz } => {
                write!(f, "Invalid timezone: {}", tz)
            }
            Self::TriggerExecutionFailed { reason } => {
                write!(f, "Trigger execution failed: {}", reason)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<FetchError> for SchedulerError {
    fn from(err: FetchError) -> Self {
        Self::CalendarFetch {
            recoverable: err.is_recoverable(),
            reason: err.to_string(),
        }
    }
}

impl SchedulerError {
    /// Create a trigger config error
    pub fn trigger_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TriggerConfigError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid timezone error
    pub fn invalid_timezone(tz: impl Into<String>) -> Self {
        Self::InvalidTimezone { tz: tz.into() }
    }

    /// Check if the next tick can be expected to succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::CalendarFetch { recoverable, .. } => *recoverable,
            Self::TriggerExecutionFailed { .. } => true,
            Self::TriggerConfigError { .. } | Self::InvalidTimezone { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_config_error() {
        let err = SchedulerError::trigger_config("digest_time", "bad format");
        assert!(err.to_string().contains("digest_time"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_from_fetch_error() {
        let err: SchedulerError = FetchError::Remote("timeout".to_string()).into();
        assert!(matches!(err, SchedulerError::CalendarFetch { .. }));
        assert!(err.is_recoverable());

        let err: SchedulerError = FetchError::Unauthorized("https://cal".to_string()).into();
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("Authentication rejected"));
    }
}
