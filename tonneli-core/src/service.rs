//! Sync reconciler that adds missing pickup events to a calendar.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::dates::{InvalidDateError, normalize};
use crate::model::{CalendarEvent, SyncOutcome, SyncStatus, WasteCalendar};
use crate::ports::{CalendarGateway, GatewayError};

#[derive(thiserror::Error, Debug)]
/// Reasons a sync run stops early.
pub enum SyncError {
    /// A schedule date does not exist on the calendar.
    #[error(transparent)]
    InvalidDate(#[from] InvalidDateError),
    /// The calendar service failed.
    #[error("Calendar gateway failed: {0}")]
    Gateway(#[from] GatewayError),
}

#[derive(thiserror::Error, Debug)]
#[error("Sync aborted after {} item(s): {source}", .completed.len())]
/// A failed sync together with the outcomes recorded before the failure.
pub struct SyncFailure {
    /// Why the run stopped.
    #[source]
    pub source: SyncError,
    /// Outcomes of the items processed before the failure, in visit order.
    pub completed: Vec<SyncOutcome>,
}

/// Public entry point for pushing a waste schedule into a calendar.
///
/// Items are processed strictly one after another: check for an existing
/// event, then create it if missing. Events are never updated or removed.
/// Two runs started at the same time against the same calendar can both miss
/// an event and both create it.
pub struct SyncService {
    gateway: Arc<dyn CalendarGateway>,
}

impl SyncService {
    /// Create a new service writing through the provided gateway.
    #[must_use]
    pub fn new(gateway: Arc<dyn CalendarGateway>) -> Self {
        Self { gateway }
    }

    /// Add every missing pickup of `calendar` and report what happened per date.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncFailure`] on the first invalid date or gateway error;
    /// it carries the outcomes completed before the failure.
    pub async fn sync(&self, calendar: &WasteCalendar) -> Result<Vec<SyncOutcome>, SyncFailure> {
        let mut outcomes = Vec::with_capacity(calendar.len());
        match self.sync_into(calendar, &mut outcomes).await {
            Ok(()) => Ok(outcomes),
            Err(source) => Err(SyncFailure {
                source,
                completed: outcomes,
            }),
        }
    }

    /// Like [`Self::sync`], appending each outcome to `outcomes` as soon as the
    /// item is done.
    ///
    /// If the returned future is dropped part-way, `outcomes` holds exactly
    /// the items finished before cancellation.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] on the first invalid date or gateway error.
    #[instrument(skip_all, fields(dates = calendar.len()))]
    pub async fn sync_into(
        &self,
        calendar: &WasteCalendar,
        outcomes: &mut Vec<SyncOutcome>,
    ) -> Result<(), SyncError> {
        for (category, dates) in calendar.iter() {
            let label = category.label();
            for date in dates {
                let status = self.sync_pickup(label, date).await?;
                debug!(%category, date = %date, %status, "pickup reconciled");
                outcomes.push(SyncOutcome {
                    label: label.to_owned(),
                    date: date.clone(),
                    status,
                });
            }
        }

        info!(processed = outcomes.len(), "sync finished");
        Ok(())
    }

    async fn sync_pickup(&self, label: &str, date: &str) -> Result<SyncStatus, SyncError> {
        let span = normalize(date)?;

        if self.gateway.find_event(label, span.start).await? {
            return Ok(SyncStatus::Skipped);
        }

        let event = CalendarEvent::pickup(label, span);
        let created = self.gateway.create_event(&event).await?;
        debug!(summary = label, id = created.id.as_deref(), "event created");

        Ok(SyncStatus::Added)
    }
}
