//! Traits describing calendar gateway capabilities and shared helper types.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate, NaiveTime, SecondsFormat};
use reqwest::Error as ReqwestError;

use crate::model::{CalendarEvent, RemoteEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Whether retrying a failed gateway call could succeed.
pub enum GatewayErrorKind {
    /// Timeouts, rate limits, expired credentials, server outages.
    Transient,
    /// Requests the service will keep refusing.
    Permanent,
}

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to the calendar service.
pub enum GatewayError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// The service throttled the request.
    #[error("Rate limited: {0}")]
    RateLimited(String),
    /// Credentials were rejected or have expired.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// The service is temporarily unable to answer.
    #[error("Service unavailable ({status}): {message}")]
    Unavailable {
        /// HTTP status code.
        status: u16,
        /// Body or reason reported by the service.
        message: String,
    },
    /// The account may not access the calendar.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// The calendar does not exist.
    #[error("Calendar not found: {0}")]
    NotFound(String),
    /// The service refused the request as malformed.
    #[error("Request rejected: {0}")]
    Rejected(String),
    /// Credential material is unusable.
    #[error("Credentials error: {0}")]
    Credentials(String),
    /// The response could not be understood.
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Classify the error as transient or permanent.
    #[must_use]
    pub fn kind(&self) -> GatewayErrorKind {
        match self {
            Self::Network(err) if err.is_decode() || err.is_builder() => GatewayErrorKind::Permanent,
            Self::Network(_)
            | Self::RateLimited(_)
            | Self::Unauthorized(_)
            | Self::Unavailable { .. } => GatewayErrorKind::Transient,
            Self::PermissionDenied(_)
            | Self::NotFound(_)
            | Self::Rejected(_)
            | Self::Credentials(_)
            | Self::Decode(_) => GatewayErrorKind::Permanent,
        }
    }

    /// Shorthand for `kind() == Transient`.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind() == GatewayErrorKind::Transient
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Lookup for an existing pickup event on a given day.
///
/// Gateways send [`Self::time_min`], [`Self::time_max`] and the summary as text
/// query, then keep only events accepted by [`Self::matches`].
pub struct ExistenceQuery {
    summary: String,
    date: NaiveDate,
    offset: FixedOffset,
}

impl ExistenceQuery {
    /// Query for `summary` on `date`, with the day window in `offset`.
    #[must_use]
    pub fn new<S: Into<String>>(summary: S, date: NaiveDate, offset: FixedOffset) -> Self {
        Self {
            summary: summary.into(),
            date,
            offset,
        }
    }

    /// Text the service should search for.
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Day being checked.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// RFC 3339 lower bound, `00:00:00` of the day.
    #[must_use]
    pub fn time_min(&self) -> String {
        self.bound(NaiveTime::MIN)
    }

    /// RFC 3339 upper bound, `23:59:59` of the day.
    #[must_use]
    pub fn time_max(&self) -> String {
        let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        self.bound(last_second)
    }

    fn bound(&self, time: NaiveTime) -> String {
        self.date
            .and_time(time)
            .and_local_timezone(self.offset)
            .single()
            .map_or_else(
                || format!("{}T{}", self.date, time.format("%H:%M:%S")),
                |local| local.to_rfc3339_opts(SecondsFormat::Secs, true),
            )
    }

    /// Whether `event` is the pickup this query looks for.
    ///
    /// The summary must match exactly and the event must start on the queried
    /// day, either as an all-day event or as a timed event whose local date is
    /// that day.
    #[must_use]
    pub fn matches(&self, event: &RemoteEvent) -> bool {
        event.summary.as_deref() == Some(self.summary.as_str())
            && event
                .start
                .is_some_and(|start| start.falls_on(self.date))
    }
}

#[async_trait]
/// Capability set of a remote calendar the reconciler writes to.
pub trait CalendarGateway: Send + Sync {
    /// Check whether an event titled `summary` already exists on `date`.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] when the lookup request fails.
    async fn find_event(&self, summary: &str, date: NaiveDate) -> Result<bool, GatewayError>;

    /// Insert a new all-day event.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] when the service rejects the insert or the
    /// request fails.
    async fn create_event(&self, event: &CalendarEvent) -> Result<RemoteEvent, GatewayError>;
}

#[async_trait]
/// Produces an authenticated gateway; credential handling stays behind it.
pub trait GatewayFactory: Send + Sync {
    /// Acquire credentials and build a ready-to-use gateway.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] when credentials cannot be obtained.
    async fn connect(&self) -> Result<Arc<dyn CalendarGateway>, GatewayError>;
}
