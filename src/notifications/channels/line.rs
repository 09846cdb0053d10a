//! LINE Messaging API push transport
//!
//! Each push carries the text message (with its quick replies) and, when
//! present, a flex bubble describing the class location.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ChannelError, ChannelResult, DeliveryStatus, MessagingTransport};
use crate::notifications::{LocationAttachment, OutboundMessage};

/// LINE transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineConfig {
    /// API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Channel access token (sent as Bearer token)
    #[serde(default, skip_serializing)]
    pub access_token: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.line.me".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            access_token: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

impl LineConfig {
    /// Create a new configuration with the default API base
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Self::default()
        }
    }

    /// Point at a different API base (tests, proxies)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.access_token.trim().is_empty() {
            return Err("LINE access token cannot be empty".to_string());
        }

        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err("LINE API base must start with http:// or https://".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// LINE push transport
///
/// # Payload Format
///
/// ```json
/// {
///   "to": "U4af4980629...",
///   "messages": [
///     {
///       "type": "text",
///       "text": "🔔 ...",
///       "quickReply": { "items": [ { "type": "action", "action": { "type": "message", "label": "...", "text": "..." } } ] }
///     },
///     { "type": "flex", "altText": "上課地點", "contents": { "type": "bubble", ... } }
///   ]
/// }
/// ```
pub struct LineTransport {
    config: LineConfig,
    client: Client,
}

impl LineTransport {
    /// Create a new LINE transport
    pub fn new(config: LineConfig) -> ChannelResult<Self> {
        config.validate().map_err(ChannelError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChannelError::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Build the push request body
    fn build_payload(&self, recipient: &str, message: &OutboundMessage) -> serde_json::Value {
        let mut text = serde_json::json!({
            "type": "text",
            "text": message.text,
        });

        if !message.quick_actions.is_empty() {
            let items: Vec<serde_json::Value> = message
                .quick_actions
                .iter()
                .map(|action| {
                    serde_json::json!({
                        "type": "action",
                        "action": {
                            "type": "message",
                            "label": action.label,
                            "text": action.text,
                        }
                    })
                })
                .collect();
            text["quickReply"] = serde_json::json!({ "items": items });
        }

        let mut messages = vec![text];
        if let Some(location) = &message.location {
            messages.push(location_bubble(location));
        }

        serde_json::json!({
            "to": recipient,
            "messages": messages,
        })
    }
}

fn location_bubble(location: &LocationAttachment) -> serde_json::Value {
    let address = if location.address.trim().is_empty() {
        "地點待確認"
    } else {
        location.address.as_str()
    };

    serde_json::json!({
        "type": "flex",
        "altText": "上課地點",
        "contents": {
            "type": "bubble",
            "body": {
                "type": "box",
                "layout": "vertical",
                "contents": [
                    { "type": "text", "text": location.title, "weight": "bold", "size": "xl" },
                    { "type": "text", "text": address, "margin": "md", "wrap": true },
                    {
                        "type": "button",
                        "style": "primary",
                        "action": { "type": "uri", "label": "🗺️ 打開地圖", "uri": location.map_url() }
                    }
                ]
            }
        }
    })
}

#[async_trait]
impl MessagingTransport for LineTransport {
    fn name(&self) -> &str {
        "line"
    }

    async fn push(&self, recipient: &str, message: &OutboundMessage) -> ChannelResult<DeliveryStatus> {
        let payload = self.build_payload(recipient, message);

        let response = self
            .client
            .post(self.endpoint("/v2/bot/message/push"))
            .bearer_auth(&self.config.access_token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(recipient = %recipient, status = %status, "LINE push accepted");
            return Ok(DeliveryStatus::success(self.name(), recipient));
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ChannelError::RateLimited(body));
        }

        Err(ChannelError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    async fn health_check(&self) -> ChannelResult<bool> {
        match self
            .client
            .get(self.endpoint("/v2/bot/info"))
            .bearer_auth(&self.config.access_token)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => Ok(true),
            Ok(response) => {
                tracing::warn!(status = %response.status(), "LINE health check rejected");
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(error = %e, "LINE health check failed");
                Ok(false)
            }
        }
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name(),
            "api_base": self.config.api_base,
            "timeout_secs": self.config.timeout_secs,
            "has_token": !self.config.access_token.is_empty(),
        })
    }
}
