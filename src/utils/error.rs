//! Error types for the coursebell dispatcher
//!
//! This module defines the leaf error types shared by the calendar adapter,
//! the roster store and the description parser.

use thiserror::Error;

/// Errors that can occur while talking to a remote store (calendar or roster)
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned status {status} for {url}")]
    Status { status: u16, url: String },

    /// Authentication rejected (401/403)
    #[error("Authentication rejected by {0}")]
    Unauthorized(String),

    /// Response body could not be understood
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The store reported an application-level failure
    #[error("Remote store error: {0}")]
    Remote(String),
}

impl FetchError {
    /// Whether retrying on the next tick can be expected to help
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Remote(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Unauthorized(_) | Self::Malformed(_) | Self::InvalidUrl(_) => false,
        }
    }
}

impl From<roxmltree::Error> for FetchError {
    fn from(err: roxmltree::Error) -> Self {
        Self::Malformed(format!("invalid XML: {err}"))
    }
}

impl From<url::ParseError> for FetchError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

/// Errors produced while turning an event description into a course record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Description is empty
    #[error("Description is empty")]
    Empty,

    /// A required label anchor was not found
    #[error("Missing label '{0}'")]
    MissingLabel(&'static str),

    /// Time segment has no date token
    #[error("Missing date in time segment")]
    MissingDate,

    /// Date token is not a valid calendar date
    #[error("Invalid date '{0}'")]
    InvalidDate(String),

    /// Time segment has no time range after the date
    #[error("Missing time range in time segment")]
    MissingTimeRange,

    /// Class segment is blank
    #[error("Class name is empty")]
    EmptyClass,

    /// Neither teachers nor assistants survived name filtering
    #[error("No teacher or assistant names found")]
    NoInstructors,
}
