//! Domain data structures for waste schedules, calendar events, and sync outcomes.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Minutes before the start of a pickup day at which the popup reminder fires.
pub const REMINDER_MINUTES: u32 = 360;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Waste categories a schedule document must list, in declared order.
pub enum WasteCategory {
    /// Light packaging, metals and plastics.
    MetalsAndPlastics,
    /// Paper and cardboard.
    Paper,
    /// Glass collection.
    Glass,
    /// Organic waste.
    Bio,
    /// Residual/mixed waste.
    Mixed,
}

impl WasteCategory {
    /// Every category in the order the reconciler visits them.
    pub const ALL: [Self; 5] = [
        Self::MetalsAndPlastics,
        Self::Paper,
        Self::Glass,
        Self::Bio,
        Self::Mixed,
    ];

    /// Key used for this category in schedule documents.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::MetalsAndPlastics => "metals_and_plastics",
            Self::Paper => "paper",
            Self::Glass => "glass",
            Self::Bio => "bio",
            Self::Mixed => "mixed",
        }
    }

    /// Summary used for calendar events of this category.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::MetalsAndPlastics => "Plastic Garbage",
            Self::Paper => "Paper Garbage",
            Self::Glass => "Glass Garbage",
            Self::Bio => "Bio Garbage",
            Self::Mixed => "Mixed Garbage",
        }
    }

    /// Resolve a document key to its category.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.key() == key)
    }
}

impl fmt::Display for WasteCategory {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.key())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Validated pickup schedule: every category mapped to its `YYYY-MM-DD` dates.
///
/// Only [`crate::validation::validate`] builds values of this type, so every
/// stored date matches the lexical date pattern. Calendar validity is checked
/// later by [`crate::dates::normalize`].
pub struct WasteCalendar {
    metals_and_plastics: Vec<String>,
    paper: Vec<String>,
    glass: Vec<String>,
    bio: Vec<String>,
    mixed: Vec<String>,
}

impl WasteCalendar {
    /// Dates listed for a category, in document order.
    #[must_use]
    pub fn dates(&self, category: WasteCategory) -> &[String] {
        match category {
            WasteCategory::MetalsAndPlastics => &self.metals_and_plastics,
            WasteCategory::Paper => &self.paper,
            WasteCategory::Glass => &self.glass,
            WasteCategory::Bio => &self.bio,
            WasteCategory::Mixed => &self.mixed,
        }
    }

    /// Iterate categories in declared order together with their dates.
    pub fn iter(&self) -> impl Iterator<Item = (WasteCategory, &[String])> {
        WasteCategory::ALL
            .into_iter()
            .map(move |category| (category, self.dates(category)))
    }

    /// Total number of dates across all categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().map(|(_, dates)| dates.len()).sum()
    }

    /// True when no category lists any date.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn set_dates(&mut self, category: WasteCategory, dates: Vec<String>) {
        let slot = match category {
            WasteCategory::MetalsAndPlastics => &mut self.metals_and_plastics,
            WasteCategory::Paper => &mut self.paper,
            WasteCategory::Glass => &mut self.glass,
            WasteCategory::Bio => &mut self.bio,
            WasteCategory::Mixed => &mut self.mixed,
        };
        *slot = dates;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Half-open `[start, end)` date range covering one all-day event.
pub struct AllDaySpan {
    /// First day of the event (inclusive).
    pub start: NaiveDate,
    /// Day after the event (exclusive).
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Delivery channel of a reminder.
pub enum ReminderMethod {
    /// Notification shown by the calendar client.
    Popup,
}

impl ReminderMethod {
    /// Wire name used by calendar APIs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Popup => "popup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Reminder attached to a created event, replacing calendar defaults.
pub struct Reminder {
    /// How the reminder is delivered.
    pub method: ReminderMethod,
    /// Minutes before event start.
    pub minutes: u32,
}

impl Reminder {
    /// The reminder every pickup event carries.
    pub const PICKUP: Self = Self {
        method: ReminderMethod::Popup,
        minutes: REMINDER_MINUTES,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// All-day event as handed to a calendar gateway for insertion.
pub struct CalendarEvent {
    /// Event title, the category label.
    pub summary: String,
    /// First day of the event.
    pub start: NaiveDate,
    /// Exclusive end day, `start + 1` for a single pickup.
    pub end: NaiveDate,
    /// Reminder override.
    pub reminder: Reminder,
}

impl CalendarEvent {
    /// Build a pickup event for the given span with the fixed reminder.
    #[must_use]
    pub fn pickup<S: Into<String>>(summary: S, span: AllDaySpan) -> Self {
        Self {
            summary: summary.into(),
            start: span.start,
            end: span.end,
            reminder: Reminder::PICKUP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Start of a remote event as calendars report it.
pub enum EventTime {
    /// Whole-day event starting on this date.
    AllDay(NaiveDate),
    /// Timed event starting at this instant, in the offset the calendar used.
    Timed(DateTime<FixedOffset>),
}

impl EventTime {
    /// Whether the event starts on `date`.
    ///
    /// Timed events compare their local date, i.e. the date part the calendar
    /// wrote, not the UTC date.
    #[must_use]
    pub fn falls_on(&self, date: NaiveDate) -> bool {
        match self {
            Self::AllDay(day) => *day == date,
            Self::Timed(instant) => instant.date_naive() == date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
/// Event as returned by a calendar service.
pub struct RemoteEvent {
    /// Provider-assigned identifier.
    pub id: Option<String>,
    /// Event title.
    pub summary: Option<String>,
    /// Start time, if the provider reported a usable one.
    pub start: Option<EventTime>,
    /// Link to the event in the provider's web UI.
    pub html_link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Terminal state of one schedule entry after a sync.
pub enum SyncStatus {
    /// A new event was created.
    Added,
    /// A matching event already existed.
    Skipped,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Added => "added",
            Self::Skipped => "skipped",
        };
        formatter.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Result record for a single (category, date) pair.
pub struct SyncOutcome {
    /// Category label used as event summary.
    pub label: String,
    /// Date as listed in the schedule document.
    pub date: String,
    /// What the reconciler did.
    pub status: SyncStatus,
}
