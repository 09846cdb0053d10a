//! Messaging transports for delivering notifications
//!
//! A transport pushes one [`OutboundMessage`] to one recipient address. The
//! LINE Messaging API is the built-in implementation.

pub mod line;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::notifications::OutboundMessage;

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur during channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid channel configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The messaging API rejected the request
    #[error("Rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error
    #[error("Channel error: {0}")]
    Other(String),
}

impl ChannelError {
    /// Whether a later attempt may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::HttpError(_) | Self::RateLimited(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
            Self::InvalidConfig(_) | Self::SerializationError(_) | Self::Other(_) => false,
        }
    }
}

/// Outcome of one delivery attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatus {
    /// Whether the message was accepted by the transport
    pub success: bool,
    /// Transport that handled the message
    pub channel: String,
    /// Recipient address
    pub recipient: String,
    /// Optional message about the delivery
    pub message: Option<String>,
    /// Timestamp of delivery attempt
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl DeliveryStatus {
    /// Create a successful delivery status
    pub fn success(channel: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            recipient: recipient.into(),
            message: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Create a failed delivery status
    pub fn failure(
        channel: impl Into<String>,
        recipient: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            channel: channel.into(),
            recipient: recipient.into(),
            message: Some(message.into()),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "SUCCESS" } else { "FAILED" };
        write!(f, "[{status}] {} -> {}", self.channel, self.recipient)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

/// Push-messaging transport
#[async_trait]
pub trait MessagingTransport: Send + Sync {
    /// Get the transport name
    fn name(&self) -> &str;

    /// Push a message to one recipient
    async fn push(&self, recipient: &str, message: &OutboundMessage) -> ChannelResult<DeliveryStatus>;

    /// Check if the transport is reachable and authorized
    async fn health_check(&self) -> ChannelResult<bool> {
        Ok(true)
    }

    /// Get transport configuration as JSON (secrets omitted)
    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name(),
        })
    }
}
