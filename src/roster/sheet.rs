//! Spreadsheet-backed roster store reached over a JSON web endpoint

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{RosterRow, RosterSource};
use crate::utils::error::FetchError;

/// Roster endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    /// Script endpoint URL
    pub url: String,
    /// Value of the `action` query parameter
    #[serde(default = "default_action")]
    pub action: String,
    /// Maximum rows requested
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_action() -> String {
    "listUsers".to_string()
}

fn default_limit() -> u32 {
    500
}

fn default_timeout() -> u64 {
    15
}

impl SheetConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            action: default_action(),
            limit: default_limit(),
            timeout_secs: default_timeout(),
        }
    }

    /// Set the listing action name
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("Roster URL cannot be empty".to_string());
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err("Roster URL must start with http:// or https://".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Full listing URL with query parameters
    fn listing_url(&self) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.url)?;
        url.query_pairs_mut()
            .append_pair("action", &self.action)
            .append_pair("limit", &self.limit.to_string())
            .append_pair("offset", "0");
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<SheetRow>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SheetRow {
    #[serde(rename = "用戶名稱", alias = "name", alias = "userName", default)]
    name: Option<String>,
    #[serde(rename = "ID", alias = "userId", alias = "id", default)]
    id: Option<String>,
}

/// Roster source reading the user sheet through its script endpoint
pub struct SheetRosterSource {
    config: SheetConfig,
    client: Client,
}

impl SheetRosterSource {
    pub fn new(config: SheetConfig) -> Result<Self, FetchError> {
        config.validate().map_err(FetchError::InvalidUrl)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &SheetConfig {
        &self.config
    }
}

#[async_trait]
impl RosterSource for SheetRosterSource {
    async fn fetch_roster(&self) -> Result<Vec<RosterRow>, FetchError> {
        let url = self.config.listing_url()?;
        tracing::debug!(url = %self.config.url, "Fetching roster");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: self.config.url.clone(),
            });
        }

        let body: ListResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(format!("roster response: {e}")))?;

        if !body.success {
            return Err(FetchError::Remote(
                body.error.unwrap_or_else(|| "roster store reported failure".to_string()),
            ));
        }

        let rows: Vec<RosterRow> = body
            .data
            .into_iter()
            .filter_map(|row| match (row.name, row.id) {
                (Some(name), Some(id)) => Some(RosterRow::new(name, id)),
                _ => None,
            })
            .collect();

        tracing::debug!(rows = rows.len(), "Roster fetched");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(SheetConfig::new("https://script.example.com/exec").validate().is_ok());
        assert!(SheetConfig::new("").validate().is_err());
        assert!(SheetConfig::new("script.example.com").validate().is_err());
        assert!(SheetConfig::new("https://x.y").with_timeout(0).validate().is_err());
    }

    #[test]
    fn test_listing_url() {
        let config = SheetConfig::new("https://script.example.com/exec");
        let url = config.listing_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://script.example.com/exec?action=listUsers&limit=500&offset=0"
        );
    }

    #[test]
    fn test_row_column_aliases() {
        let body: ListResponse = serde_json::from_str(
            r#"{"success":true,"data":[
                {"ID":"U1","用戶名稱":"Tim"},
                {"userId":"U2","name":"Alice"},
                {"ID":"U3"}
            ]}"#,
        )
        .unwrap();

        assert!(body.success);
        assert_eq!(body.data.len(), 3);
        assert_eq!(body.data[0].name.as_deref(), Some("Tim"));
        assert_eq!(body.data[1].id.as_deref(), Some("U2"));
        assert!(body.data[2].name.is_none());
    }
}
