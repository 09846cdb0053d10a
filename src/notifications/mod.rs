//! Notification payloads, composition and delivery
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │      MessageComposer                       │
//! │  - Reminder text + quick actions           │
//! │  - Location attachment                     │
//! │  - Daily digest text                       │
//! └────────────────────────────────────────────┘
//!                     │ OutboundMessage
//!                     ▼
//! ┌────────────────────────────────────────────┐
//! │      Dispatcher                            │
//! │  - Per-recipient fan-out                   │
//! │  - Failure isolation                       │
//! └────────────────────────────────────────────┘
//!                     │
//!                     ▼
//!            ┌──────────────────┐
//!            │ MessagingTransport│ (LINE push API)
//!            └──────────────────┘
//! ```
//!
//! Quick actions carry a colon-delimited [`QuickActionToken`]. The token is
//! decoded by an external confirmation handler; transports treat it as an
//! opaque string.

pub mod channels;
pub mod compose;
pub mod dispatcher;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use url::Url;

// Re-exports
pub use channels::line::{LineConfig, LineTransport};
pub use channels::{ChannelError, ChannelResult, DeliveryStatus, MessagingTransport};
pub use compose::MessageComposer;
pub use dispatcher::{DispatchReport, Dispatcher};

/// Placeholder the confirmation handler reads as "no assistant"
pub const NO_ASSISTANT: &str = "nan";

/// A message ready to be pushed to one or more recipients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Main text content
    pub text: String,
    /// Optional location card
    pub location: Option<LocationAttachment>,
    /// Selectable replies attached to the text
    #[serde(default)]
    pub quick_actions: Vec<QuickAction>,
}

impl OutboundMessage {
    /// Plain text message
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            location: None,
            quick_actions: Vec::new(),
        }
    }

    pub fn with_location(mut self, location: LocationAttachment) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_quick_actions(mut self, actions: Vec<QuickAction>) -> Self {
        self.quick_actions = actions;
        self
    }
}

/// Venue card attached to a reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationAttachment {
    pub title: String,
    pub address: String,
}

impl LocationAttachment {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            title: "📍 上課地點".to_string(),
            address: address.into(),
        }
    }

    /// Map search link for the address
    pub fn map_url(&self) -> String {
        Url::parse_with_params("https://www.google.com/maps", &[("q", self.address.as_str())])
            .map(|u| u.to_string())
            .unwrap_or_else(|_| "https://www.google.com/maps".to_string())
    }
}

/// One selectable reply: a button label and the text sent back when tapped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickAction {
    pub label: String,
    pub text: String,
}

impl QuickAction {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// Attendance answers offered with every reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceReply {
    /// Class held with one or two students
    Small,
    /// Class held with three or more students
    Large,
    /// Home visit or custom arrangement
    Custom,
    /// Class did not take place
    NotHeld,
}

impl AttendanceReply {
    pub const ALL: [AttendanceReply; 4] = [Self::Small, Self::Large, Self::Custom, Self::NotHeld];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Small => "✅上課 １～2人",
            Self::Large => "✅上課 3人含以上",
            Self::Custom => "✅上課 到府或客製化",
            Self::NotHeld => "❌沒上課",
        }
    }

    /// Student-count tier written into the token
    pub fn tier(&self) -> i32 {
        match self {
            Self::Small => 1,
            Self::Large => 3,
            Self::Custom => 99,
            Self::NotHeld => -1,
        }
    }

    pub fn attended(&self) -> bool {
        !matches!(self, Self::NotHeld)
    }
}

/// Error decoding a quick-action token
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid quick-action token: {0}")]
pub struct TokenParseError(String);

/// Confirmation token carried by a quick action
///
/// Wire form: `owner:title:class:YYYY/MM/DD:timeRange:assistants:tier:YES|NO`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickActionToken {
    pub owner: String,
    pub event_title: String,
    pub class_name: String,
    /// `YYYY/MM/DD`
    pub date: String,
    pub time_range: String,
    pub assistants: Vec<String>,
    pub tier: i32,
    pub attended: bool,
}

impl QuickActionToken {
    /// The same token with a different answer
    pub fn answer(&self, reply: AttendanceReply) -> Self {
        Self {
            tier: reply.tier(),
            attended: reply.attended(),
            ..self.clone()
        }
    }

    /// The standard reply set for this token
    pub fn replies(&self) -> Vec<QuickAction> {
        AttendanceReply::ALL
            .iter()
            .map(|reply| QuickAction::new(reply.label(), self.answer(*reply).to_string()))
            .collect()
    }
}

/// Colons would shift the fields, so they are swapped for the full-width form
fn field(value: &str) -> String {
    value.trim().replace(':', "：")
}

impl fmt::Display for QuickActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let assistants = if self.assistants.is_empty() {
            NO_ASSISTANT.to_string()
        } else {
            field(&self.assistants.join(", "))
        };
        write!(
            f,
            "{}:{}:{}:{}:{}:{}:{}:{}",
            field(&self.owner),
            field(&self.event_title),
            field(&self.class_name),
            self.date,
            self.time_range,
            assistants,
            self.tier,
            if self.attended { "YES" } else { "NO" },
        )
    }
}

impl FromStr for QuickActionToken {
    type Err = TokenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
        let re = TOKEN_RE.get_or_init(|| {
            Regex::new(
                r"^(.*?):(.*?):(.*?):(\d{4}/\d{2}/\d{2}):([\d:]+-[\d:]+):(.*?):(-?\d+):([A-Z]+)$",
            )
            .expect("Invalid regex pattern")
        });

        let caps = re
            .captures(s.trim())
            .ok_or_else(|| TokenParseError(s.to_string()))?;

        let attended = match &caps[8] {
            "YES" => true,
            "NO" => false,
            other => return Err(TokenParseError(format!("unknown flag {other}"))),
        };
        let tier = caps[7]
            .parse::<i32>()
            .map_err(|e| TokenParseError(format!("tier: {e}")))?;

        let assistants = match caps[6].trim() {
            "" => Vec::new(),
            a if a.eq_ignore_ascii_case(NO_ASSISTANT) => Vec::new(),
            a => a
                .split(',')
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect(),
        };

        Ok(Self {
            owner: caps[1].to_string(),
            event_title: caps[2].to_string(),
            class_name: caps[3].to_string(),
            date: caps[4].to_string(),
            time_range: caps[5].to_string(),
            assistants,
            tier,
            attended,
        })
    }
}
