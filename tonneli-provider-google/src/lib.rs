//! Calendar gateway implementation for Google Calendar using the v3 REST API.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tonneli_core::{
    dates::DATE_FORMAT,
    model::{CalendarEvent, EventTime, RemoteEvent},
    ports::{CalendarGateway, ExistenceQuery, GatewayError, GatewayFactory},
};

/// Access-token sources.
pub mod auth;

use crate::auth::{ServiceAccount, ServiceAccountKey, StaticToken, TokenSource};

/// Production endpoint of the Calendar API.
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

const RATE_LIMIT_REASONS: [&str; 3] = ["rateLimitExceeded", "userRateLimitExceeded", "quotaExceeded"];

/// Page of results from `events.list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    next_page_token: Option<String>,
}

/// Event resource, reduced to the fields the sync needs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    id: Option<String>,
    summary: Option<String>,
    start: Option<EventDateTime>,
    html_link: Option<String>,
}

/// Either `date` (all-day) or `dateTime` (timed) is set.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
}

/// Body of `events.insert`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewEvent<'a> {
    summary: &'a str,
    start: EventDateTime,
    end: EventDateTime,
    reminders: Reminders,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Reminders {
    use_default: bool,
    overrides: Vec<ReminderOverride>,
}

#[derive(Debug, Serialize)]
struct ReminderOverride {
    method: &'static str,
    minutes: u32,
}

/// Error envelope returned by Google APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

impl EventDateTime {
    fn all_day(date: NaiveDate) -> Self {
        Self {
            date: Some(date.format(DATE_FORMAT).to_string()),
            date_time: None,
        }
    }

    fn to_event_time(&self) -> Option<EventTime> {
        if let Some(date) = self.date.as_deref() {
            return NaiveDate::parse_from_str(date, DATE_FORMAT)
                .ok()
                .map(EventTime::AllDay);
        }
        self.date_time
            .as_deref()
            .and_then(|stamp| DateTime::parse_from_rfc3339(stamp).ok())
            .map(EventTime::Timed)
    }
}

impl From<GoogleEvent> for RemoteEvent {
    fn from(event: GoogleEvent) -> Self {
        Self {
            start: event.start.as_ref().and_then(EventDateTime::to_event_time),
            id: event.id,
            summary: event.summary,
            html_link: event.html_link,
        }
    }
}

impl<'a> From<&'a CalendarEvent> for NewEvent<'a> {
    fn from(event: &'a CalendarEvent) -> Self {
        Self {
            summary: &event.summary,
            start: EventDateTime::all_day(event.start),
            end: EventDateTime::all_day(event.end),
            reminders: Reminders {
                use_default: false,
                overrides: vec![ReminderOverride {
                    method: event.reminder.method.as_str(),
                    minutes: event.reminder.minutes,
                }],
            },
        }
    }
}

/// Gateway writing pickup events into one Google calendar.
pub struct GoogleCalendarGateway {
    client: Client,
    base_url: String,
    calendar_id: String,
    tokens: Arc<dyn TokenSource>,
    offset: FixedOffset,
}

impl GoogleCalendarGateway {
    /// Create a gateway for `calendar_id`, authenticating with `tokens`.
    #[must_use]
    pub fn new<S: Into<String>>(client: Client, calendar_id: S, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_owned(),
            calendar_id: calendar_id.into(),
            tokens,
            offset: Utc.fix(),
        }
    }

    /// Point the gateway at another API root, e.g. a mock server.
    #[must_use]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Offset in which the existence-check day window is expressed.
    #[must_use]
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    fn events_url(&self) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| GatewayError::Rejected(format!("Invalid API URL {}: {err}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| GatewayError::Rejected(format!("Invalid API URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(["calendars", self.calendar_id.as_str(), "events"]);
        Ok(url)
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, GatewayError> {
        let token = self.tokens.access_token().await?;
        Ok(request.bearer_auth(token))
    }
}

#[async_trait]
impl CalendarGateway for GoogleCalendarGateway {
    async fn find_event(&self, summary: &str, date: NaiveDate) -> Result<bool, GatewayError> {
        let query = ExistenceQuery::new(summary, date, self.offset);
        let url = self.events_url()?;
        let time_min = query.time_min();
        let time_max = query.time_max();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self.client.get(url.clone()).query(&[
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("q", query.summary()),
                ("singleEvents", "true"),
            ]);
            if let Some(token) = page_token.as_deref() {
                req = req.query(&[("pageToken", token)]);
            }

            let page = fetch_json::<EventsPage>(self.authorized(req).await?).await?;

            if page
                .items
                .into_iter()
                .map(RemoteEvent::from)
                .any(|event| query.matches(&event))
            {
                debug!(summary, %date, "existing event found");
                return Ok(true);
            }

            match page.next_page_token {
                Some(next) if page_token.as_deref() == Some(next.as_str()) => {
                    return Err(GatewayError::Decode(format!(
                        "events.list returned page token {next} twice"
                    )));
                }
                Some(next) => page_token = Some(next),
                None => return Ok(false),
            }
        }
    }

    async fn create_event(&self, event: &CalendarEvent) -> Result<RemoteEvent, GatewayError> {
        let req = self
            .client
            .post(self.events_url()?)
            .json(&NewEvent::from(event));

        let created = fetch_json::<GoogleEvent>(self.authorized(req).await?).await?;
        Ok(created.into())
    }
}

#[derive(Debug, Clone)]
/// How the factory authenticates.
pub enum Credentials {
    /// Pre-issued OAuth access token.
    AccessToken(String),
    /// Path to a service-account JSON key file.
    ServiceAccountKey(PathBuf),
}

/// Builds authenticated [`GoogleCalendarGateway`]s.
pub struct GoogleGatewayFactory {
    client: Client,
    calendar_id: String,
    credentials: Credentials,
    base_url: String,
    offset: Option<FixedOffset>,
}

impl GoogleGatewayFactory {
    /// Create a factory bound to the given HTTP client.
    #[must_use]
    pub fn new<S: Into<String>>(client: Client, calendar_id: S, credentials: Credentials) -> Self {
        Self {
            client,
            calendar_id: calendar_id.into(),
            credentials,
            base_url: DEFAULT_BASE_URL.to_owned(),
            offset: None,
        }
    }

    /// Use another API root for the gateways this factory creates.
    #[must_use]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Offset for the existence-check day window.
    #[must_use]
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[async_trait]
impl GatewayFactory for GoogleGatewayFactory {
    async fn connect(&self) -> Result<Arc<dyn CalendarGateway>, GatewayError> {
        let tokens: Arc<dyn TokenSource> = match &self.credentials {
            Credentials::AccessToken(token) => Arc::new(StaticToken::new(token.clone())),
            Credentials::ServiceAccountKey(path) => {
                let key = ServiceAccountKey::from_file(path).await?;
                let account = ServiceAccount::new(self.client.clone(), key)?;
                // Fail at connect time rather than on the first lookup.
                account.access_token().await?;
                Arc::new(account)
            }
        };

        let mut gateway =
            GoogleCalendarGateway::new(self.client.clone(), self.calendar_id.clone(), tokens)
                .with_base_url(self.base_url.clone());
        if let Some(offset) = self.offset {
            gateway = gateway.with_utc_offset(offset);
        }
        Ok(Arc::new(gateway))
    }
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, GatewayError> {
    let response = req.send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, &body));
    }

    response
        .json()
        .await
        .map_err(|err| GatewayError::Decode(err.to_string()))
}

/// Map a non-success API response to a gateway error.
pub(crate) fn status_error(status: StatusCode, body: &str) -> GatewayError {
    let message = error_message(body);
    match status.as_u16() {
        400 => GatewayError::Rejected(message),
        401 => GatewayError::Unauthorized(message),
        403 if is_rate_limited(body) => GatewayError::RateLimited(message),
        403 => GatewayError::PermissionDenied(message),
        404 => GatewayError::NotFound(message),
        429 => GatewayError::RateLimited(message),
        code @ 500..=599 => GatewayError::Unavailable {
            status: code,
            message,
        },
        _ => GatewayError::Rejected(format!("{status}: {message}")),
    }
}

/// Best-effort human message from a Google error body.
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
        _ if body.trim().is_empty() => "no details".to_owned(),
        _ => body.trim().to_owned(),
    }
}

fn is_rate_limited(body: &str) -> bool {
    serde_json::from_str::<ErrorEnvelope>(body).is_ok_and(|envelope| {
        envelope
            .error
            .errors
            .iter()
            .any(|detail| RATE_LIMIT_REASONS.contains(&detail.reason.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tonneli_core::model::AllDaySpan;

    use super::*;

    fn day(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, DATE_FORMAT).expect("valid date")
    }

    #[test]
    fn insert_body_overrides_default_reminders() {
        let event = CalendarEvent::pickup(
            "Glass Garbage",
            AllDaySpan {
                start: day("2024-12-31"),
                end: day("2025-01-01"),
            },
        );

        let body = serde_json::to_value(NewEvent::from(&event)).expect("serializable");
        assert_eq!(
            body,
            json!({
                "summary": "Glass Garbage",
                "start": { "date": "2024-12-31" },
                "end": { "date": "2025-01-01" },
                "reminders": {
                    "useDefault": false,
                    "overrides": [{ "method": "popup", "minutes": 360 }],
                },
            })
        );
    }

    #[test]
    fn decodes_both_start_shapes() {
        let all_day: GoogleEvent = serde_json::from_value(json!({
            "id": "a", "summary": "Bio Garbage", "start": { "date": "2024-06-04" }
        }))
        .expect("decodes");
        let timed: GoogleEvent = serde_json::from_value(json!({
            "id": "b", "summary": "Bio Garbage",
            "start": { "dateTime": "2024-06-04T06:00:00+02:00", "timeZone": "Europe/Berlin" }
        }))
        .expect("decodes");

        assert_eq!(
            RemoteEvent::from(all_day).start,
            Some(EventTime::AllDay(day("2024-06-04")))
        );
        assert!(
            RemoteEvent::from(timed)
                .start
                .is_some_and(|start| start.falls_on(day("2024-06-04")))
        );
    }

    #[test]
    fn maps_statuses_to_error_kinds() {
        let quota = json!({
            "error": {
                "code": 403,
                "message": "Rate Limit Exceeded",
                "errors": [{ "domain": "usageLimits", "reason": "rateLimitExceeded" }]
            }
        })
        .to_string();
        let forbidden = json!({
            "error": {
                "code": 403,
                "message": "You need to have writer access to this calendar.",
                "errors": [{ "domain": "calendar", "reason": "requiredAccessLevel" }]
            }
        })
        .to_string();

        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, &quota),
            GatewayError::RateLimited(ref msg) if msg == "Rate Limit Exceeded"
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, &forbidden),
            GatewayError::PermissionDenied(_)
        ));
        assert!(status_error(StatusCode::UNAUTHORIZED, "").is_transient());
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE, "down").is_transient());
        assert!(!status_error(StatusCode::BAD_REQUEST, "{}").is_transient());
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "Not Found"),
            GatewayError::NotFound(ref msg) if msg == "Not Found"
        ));
    }

    #[test]
    fn events_url_encodes_calendar_id() {
        let gateway = GoogleCalendarGateway::new(
            Client::new(),
            "en.german#holiday@group.v.calendar.google.com",
            Arc::new(StaticToken::new("token")),
        )
        .with_base_url("http://localhost:9999/calendar/v3/");

        let url = gateway.events_url().expect("valid url");
        assert_eq!(
            url.as_str(),
            "http://localhost:9999/calendar/v3/calendars/en.german%23holiday@group.v.calendar.google.com/events"
        );
    }
}
