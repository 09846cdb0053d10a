//! CalDAV calendar source over plain HTTP
//!
//! Discovery follows RFC 6764/4791: `current-user-principal`, then
//! `calendar-home-set`, then a Depth 1 listing of the home collection. Events
//! are read with a `calendar-query` REPORT, optionally restricted to a
//! time range and expanded into occurrences by the server.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{ics, CalendarEvent, CalendarInfo, CalendarSource};
use crate::utils::error::FetchError;

/// CalDAV connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalDavSettings {
    /// Server base URL
    pub url: String,

    pub username: String,

    #[serde(default, skip_serializing)]
    pub password: String,

    /// Calendar home collection; skips discovery when set
    #[serde(default)]
    pub home_url: Option<String>,

    /// Zone for floating and date-only values
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timezone() -> String {
    "Asia/Taipei".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for CalDavSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            home_url: None,
            timezone: default_timezone(),
            timeout_secs: default_timeout(),
        }
    }
}

impl CalDavSettings {
    pub fn new(url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Set the calendar home collection
    pub fn with_home_url(mut self, home_url: impl Into<String>) -> Self {
        self.home_url = Some(home_url.into());
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("CalDAV URL cannot be empty".to_string());
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err("CalDAV URL must start with http:// or https://".to_string());
        }
        if self.timezone.parse::<Tz>().is_err() {
            return Err(format!("Unknown timezone: {}", self.timezone));
        }
        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

const PRINCIPAL_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
    <d:prop>
        <d:current-user-principal/>
    </d:prop>
</d:propfind>"#;

const HOME_SET_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
    <d:prop>
        <c:calendar-home-set/>
    </d:prop>
</d:propfind>"#;

const COLLECTIONS_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
    <d:prop>
        <d:resourcetype/>
        <d:displayname/>
    </d:prop>
</d:propfind>"#;

/// CalDAV-backed [`CalendarSource`]
pub struct CalDavSource {
    settings: CalDavSettings,
    base: Url,
    tz: Tz,
    client: Client,
}

impl CalDavSource {
    pub fn new(settings: CalDavSettings) -> Result<Self, FetchError> {
        settings.validate().map_err(FetchError::InvalidUrl)?;

        let base = Url::parse(&settings.url)?;
        let tz = settings
            .timezone
            .parse::<Tz>()
            .map_err(|_| FetchError::InvalidUrl(format!("Unknown timezone: {}", settings.timezone)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            settings,
            base,
            tz,
            client,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Send a WebDAV request and return the body of a successful response
    async fn dav(&self, method: &str, href: &str, depth: u8, body: String) -> Result<String, FetchError> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| FetchError::Malformed(format!("invalid method {method}: {e}")))?;
        let url = self.base.join(href)?;

        let response = self
            .client
            .request(method, url.clone())
            .basic_auth(&self.settings.username, Some(&self.settings.password))
            .header("Depth", depth.to_string())
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized(url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }

    /// Find the calendar home collection
    async fn calendar_home(&self) -> Result<String, FetchError> {
        if let Some(home) = &self.settings.home_url {
            return Ok(home.clone());
        }

        let body = self
            .dav("PROPFIND", self.base.path(), 0, PRINCIPAL_BODY.to_string())
            .await?;
        let principal = find_prop_href(&body, "current-user-principal")?.ok_or_else(|| {
            FetchError::Malformed("current-user-principal missing from response".to_string())
        })?;

        let body = self
            .dav("PROPFIND", &principal, 0, HOME_SET_BODY.to_string())
            .await?;
        let home = find_prop_href(&body, "calendar-home-set")?.ok_or_else(|| {
            FetchError::Malformed("calendar-home-set missing from response".to_string())
        })?;

        tracing::debug!(principal = %principal, home = %home, "Discovered calendar home");
        Ok(home)
    }

    async fn query(&self, calendar: &CalendarInfo, body: String) -> Result<Vec<CalendarEvent>, FetchError> {
        let response = self.dav("REPORT", &calendar.href, 1, body).await?;
        let events = parse_calendar_data(&response)?
            .into_iter()
            .flat_map(|(_, data)| ics::parse_events(&data, &calendar.label, self.tz))
            .collect();
        Ok(events)
    }
}

#[async_trait]
impl CalendarSource for CalDavSource {
    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>, FetchError> {
        let home = self.calendar_home().await?;
        let body = self
            .dav("PROPFIND", &home, 1, COLLECTIONS_BODY.to_string())
            .await?;
        let home_path = self.base.join(&home)?.path().to_string();
        let calendars = parse_collections(&body, &home_path)?;
        tracing::debug!(count = calendars.len(), "Listed calendars");
        Ok(calendars)
    }

    async fn list_events(&self, calendar: &CalendarInfo) -> Result<Vec<CalendarEvent>, FetchError> {
        self.query(calendar, calendar_query(None)).await
    }

    async fn list_events_between(
        &self,
        calendar: &CalendarInfo,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, FetchError> {
        let events = self.query(calendar, calendar_query(Some((start, end)))).await?;
        // servers without expansion return recurring masters as-is
        Ok(events
            .into_iter()
            .filter(|event| event.starts_within(start, end))
            .collect())
    }
}

/// Format a time for CalDAV time-range attributes
pub fn format_caldav_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Build a `calendar-query` REPORT body
fn calendar_query(range: Option<(DateTime<Utc>, DateTime<Utc>)>) -> String {
    let (data, filter) = match range {
        Some((start, end)) => {
            let start = format_caldav_datetime(start);
            let end = format_caldav_datetime(end);
            (
                format!(r#"<c:calendar-data><c:expand start="{start}" end="{end}"/></c:calendar-data>"#),
                format!(r#"<c:time-range start="{start}" end="{end}"/>"#),
            )
        }
        None => ("<c:calendar-data/>".to_string(), String::new()),
    };

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
    <d:prop>
        <d:getetag/>
        {data}
    </d:prop>
    <c:filter>
        <c:comp-filter name="VCALENDAR">
            <c:comp-filter name="VEVENT">{filter}</c:comp-filter>
        </c:comp-filter>
    </c:filter>
</c:calendar-query>"#
    )
}

/// Href nested in the named property of a multistatus body
fn find_prop_href(body: &str, prop: &str) -> Result<Option<String>, FetchError> {
    let doc = roxmltree::Document::parse(body)?;
    let href = doc
        .descendants()
        .find(|n| n.tag_name().name() == prop)
        .and_then(|n| n.descendants().find(|c| c.tag_name().name() == "href"))
        .and_then(|n| n.text())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    Ok(href)
}

/// Calendar collections listed under the home collection
fn parse_collections(body: &str, home_path: &str) -> Result<Vec<CalendarInfo>, FetchError> {
    let doc = roxmltree::Document::parse(body)?;
    let mut calendars = Vec::new();

    for response in doc.descendants().filter(|n| n.tag_name().name() == "response") {
        let Some(href) = response
            .children()
            .find(|n| n.tag_name().name() == "href")
            .and_then(|n| n.text())
            .map(|s| s.trim().to_string())
        else {
            continue;
        };

        if href.trim_end_matches('/') == home_path.trim_end_matches('/') {
            continue;
        }

        let is_calendar = response
            .descendants()
            .filter(|n| n.tag_name().name() == "resourcetype")
            .any(|rt| rt.children().any(|c| c.tag_name().name() == "calendar"));
        if !is_calendar {
            continue;
        }

        let label = response
            .descendants()
            .find(|n| n.tag_name().name() == "displayname")
            .and_then(|n| n.text())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| last_segment(&href));

        calendars.push(CalendarInfo::new(href, label));
    }

    Ok(calendars)
}

/// `(href, calendar-data)` pairs of a REPORT response
fn parse_calendar_data(body: &str) -> Result<Vec<(String, String)>, FetchError> {
    let doc = roxmltree::Document::parse(body)?;
    let mut resources = Vec::new();

    for response in doc.descendants().filter(|n| n.tag_name().name() == "response") {
        let Some(href) = response
            .children()
            .find(|n| n.tag_name().name() == "href")
            .and_then(|n| n.text())
        else {
            continue;
        };

        let data = response
            .descendants()
            .find(|n| n.tag_name().name() == "calendar-data")
            .and_then(|n| n.text());

        if let Some(data) = data {
            resources.push((href.trim().to_string(), data.to_string()));
        }
    }

    Ok(resources)
}

fn last_segment(href: &str) -> String {
    href.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(href)
        .to_string()
}
