//! Core types and sync reconciler for pushing waste pickup schedules into a calendar.

/// Date parsing and all-day span normalization.
pub mod dates;
/// Domain models shared by the reconciler and gateways.
pub mod model;
/// Traits describing the calendar gateway interfaces.
pub mod ports;
/// Outcome summaries for front-ends.
pub mod report;
/// Sync reconciler used by clients.
pub mod service;
/// Schema validation for schedule documents.
pub mod validation;

pub use dates::*;
pub use model::*;
pub use ports::*;
pub use report::*;
pub use service::*;
pub use validation::*;
