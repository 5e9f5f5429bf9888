//! Summary view over sync outcomes for front-ends.

use crate::model::{SyncOutcome, SyncStatus};

/// Read-only summary of a finished (or interrupted) sync run.
#[derive(Debug, Clone, Copy)]
pub struct SyncReport<'a> {
    outcomes: &'a [SyncOutcome],
}

impl<'a> SyncReport<'a> {
    /// Wrap outcomes in reconciler order.
    #[must_use]
    pub fn new(outcomes: &'a [SyncOutcome]) -> Self {
        Self { outcomes }
    }

    /// Outcomes in the order the reconciler produced them.
    #[must_use]
    pub fn outcomes(&self) -> &'a [SyncOutcome] {
        self.outcomes
    }

    /// Number of events created.
    #[must_use]
    pub fn added(&self) -> usize {
        self.count(SyncStatus::Added)
    }

    /// Number of dates that already had an event.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(SyncStatus::Skipped)
    }

    /// Number of processed dates.
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Outcomes sorted by date; ties keep reconciler order.
    #[must_use]
    pub fn by_date(&self) -> Vec<&'a SyncOutcome> {
        let mut sorted: Vec<_> = self.outcomes.iter().collect();
        sorted.sort_by(|left, right| left.date.cmp(&right.date));
        sorted
    }

    fn count(&self, status: SyncStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == status)
            .count()
    }
}
