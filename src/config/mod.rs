//! Configuration management for coursebell
//!
//! Settings come from an optional TOML file, then `COURSEBELL_*` environment
//! variables, then validation. Secrets (CalDAV password, LINE token) are
//! normally supplied through the environment only.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::calendar::CalDavSettings;
use crate::notifications::LineConfig;
use crate::parser::{NameFilter, DEFAULT_MIN_NAME_LEN, DEFAULT_NOISE_WORDS};
use crate::roster::{ResolverConfig, SheetConfig};
use crate::scheduler::TriggerConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// CalDAV calendar store
    pub calendar: CalDavSettings,

    /// Roster store and name matching
    pub roster: RosterConfig,

    /// Description parsing
    pub parser: ParserConfig,

    /// LINE messaging
    pub line: LineConfig,

    /// Timers
    pub scheduler: TriggerConfig,

    /// Metrics listener
    pub metrics: MetricsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Roster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Roster script endpoint URL
    pub url: String,

    /// Listing action name
    pub action: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Seconds a fetched roster stays fresh
    pub refresh_secs: u64,

    /// Minimum similarity accepted by fuzzy matching
    pub fuzzy_threshold: f64,
}

impl Default for RosterConfig {
    fn default() -> Self {
        let sheet = SheetConfig::new("");
        let resolver = ResolverConfig::default();
        Self {
            url: sheet.url,
            action: sheet.action,
            timeout_secs: sheet.timeout_secs,
            refresh_secs: resolver.refresh_interval.as_secs(),
            fuzzy_threshold: resolver.fuzzy_threshold,
        }
    }
}

impl RosterConfig {
    pub fn sheet(&self) -> SheetConfig {
        SheetConfig::new(&self.url)
            .with_action(&self.action)
            .with_timeout(self.timeout_secs)
    }

    pub fn resolver(&self) -> ResolverConfig {
        ResolverConfig {
            refresh_interval: Duration::from_secs(self.refresh_secs),
            fuzzy_threshold: self.fuzzy_threshold,
        }
    }
}

/// Parser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Shortest accepted name, in characters
    pub min_name_len: usize,

    /// Tokens never treated as names (case-insensitive)
    pub noise_words: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            min_name_len: DEFAULT_MIN_NAME_LEN,
            noise_words: DEFAULT_NOISE_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl ParserConfig {
    pub fn name_filter(&self) -> NameFilter {
        NameFilter::new(self.min_name_len, &self.noise_words)
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Address for the `/metrics` and `/health` listener; disabled when unset
    pub listen: Option<SocketAddr>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration: file (if it exists), then environment, then validate
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("Config file {} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Override fields from `COURSEBELL_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_var("COURSEBELL_CALDAV_URL") {
            self.calendar.url = v;
        }
        if let Some(v) = env_var("COURSEBELL_CALDAV_USERNAME") {
            self.calendar.username = v;
        }
        if let Some(v) = env_var("COURSEBELL_CALDAV_PASSWORD") {
            self.calendar.password = v;
        }
        if let Some(v) = env_var("COURSEBELL_CALDAV_HOME_URL") {
            self.calendar.home_url = Some(v);
        }
        if let Some(v) = env_var("COURSEBELL_TIMEZONE") {
            self.calendar.timezone = v.clone();
            self.scheduler.timezone = v;
        }

        if let Some(v) = env_var("COURSEBELL_ROSTER_URL") {
            self.roster.url = v;
        }
        if let Some(v) = env_parse("COURSEBELL_ROSTER_REFRESH_SECS")? {
            self.roster.refresh_secs = v;
        }
        if let Some(v) = env_parse("COURSEBELL_FUZZY_THRESHOLD")? {
            self.roster.fuzzy_threshold = v;
        }

        if let Some(v) = env_var("COURSEBELL_LINE_TOKEN") {
            self.line.access_token = v;
        }
        if let Some(v) = env_var("COURSEBELL_LINE_API_BASE") {
            self.line.api_base = v;
        }

        if let Some(v) = env_parse("COURSEBELL_SCAN_INTERVAL_SECS")? {
            self.scheduler.scan_interval_secs = v;
        }
        if let Some(v) = env_var("COURSEBELL_DIGEST_TIME") {
            self.scheduler.digest_time = v;
        }
        if let Some(v) = env_var("COURSEBELL_CHECKIN_URL") {
            self.scheduler.checkin_url = v;
        }

        if let Some(v) = env_parse("COURSEBELL_METRICS_LISTEN")? {
            self.metrics.listen = Some(v);
        }
        if let Some(v) = env_var("COURSEBELL_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env_var("COURSEBELL_LOG_FORMAT") {
            self.logging.format = v;
        }

        Ok(())
    }

    /// Validate configuration values
    ///
    /// Only settings every command relies on are checked here; the
    /// calendar, roster and LINE sections are validated by their adapters
    /// when constructed.
    pub fn validate(&self) -> Result<()> {
        self.scheduler
            .validate()
            .map_err(|e| anyhow::anyhow!("scheduler: {e}"))?;

        if !(0.0..=1.0).contains(&self.roster.fuzzy_threshold) {
            anyhow::bail!("roster.fuzzy_threshold must be within 0.0..=1.0");
        }

        if self.roster.refresh_secs == 0 {
            anyhow::bail!("roster.refresh_secs must be greater than 0");
        }

        if self.parser.min_name_len == 0 {
            anyhow::bail!("parser.min_name_len must be greater than 0");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging.format must be 'text' or 'json'");
        }

        Ok(())
    }

    /// Get the roster refresh interval as Duration
    #[must_use]
    pub fn roster_refresh(&self) -> Duration {
        Duration::from_secs(self.roster.refresh_secs)
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_var(key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{key}: {e}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.roster_refresh(), Duration::from_secs(300));
        assert_eq!(config.roster.fuzzy_threshold, 0.6);
        assert_eq!(config.parser.min_name_len, 3);
    }

    #[test]
    fn test_invalid_threshold() {
        let mut config = Config::default();
        config.roster.fuzzy_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [calendar]
            url = "https://caldav.example.com"
            username = "bell"

            [scheduler]
            digest_time = "07:15"
            "#,
        )
        .unwrap();

        assert_eq!(config.calendar.timezone, "Asia/Taipei");
        assert_eq!(config.scheduler.digest_time, "07:15");
        assert_eq!(config.scheduler.max_lead_minutes, 30);
        assert_eq!(config.line.api_base, "https://api.line.me");
        assert!(config.metrics.listen.is_none());
    }

    #[test]
    fn test_roster_conversions() {
        let mut config = Config::default();
        config.roster.url = "https://script.example.com/exec".to_string();
        config.roster.refresh_secs = 60;

        assert_eq!(config.roster.sheet().url, "https://script.example.com/exec");
        assert_eq!(config.roster.resolver().refresh_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_noise_words_configurable() {
        let parser = ParserConfig {
            min_name_len: 2,
            noise_words: vec!["staff".to_string()],
        };
        let filter = parser.name_filter();
        assert!(!filter.accepts("STAFF"));
        assert!(filter.accepts("Al"));
    }
}
