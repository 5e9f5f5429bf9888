//! Calendar-date parsing and all-day range normalization.

use chrono::{Days, NaiveDate};

use crate::model::AllDaySpan;

/// `chrono` format for schedule dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid calendar date: {input:?}")]
/// A schedule date that is not a real calendar day, such as `2024-02-30`.
pub struct InvalidDateError {
    /// The rejected input.
    pub input: String,
}

/// Check the lexical `\d{4}-\d{2}-\d{2}` shape without judging calendar validity.
#[must_use]
pub fn is_date_pattern(input: &str) -> bool {
    let bytes = input.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(idx, byte)| match idx {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

/// Parse a `YYYY-MM-DD` string into a calendar date.
///
/// # Errors
///
/// Returns [`InvalidDateError`] when the input is not in `YYYY-MM-DD` form or
/// names a day that does not exist.
pub fn parse_date(input: &str) -> Result<NaiveDate, InvalidDateError> {
    if !is_date_pattern(input) {
        return Err(InvalidDateError {
            input: input.to_owned(),
        });
    }
    NaiveDate::parse_from_str(input, DATE_FORMAT).map_err(|_parse_err| InvalidDateError {
        input: input.to_owned(),
    })
}

/// Turn a single pickup date into the `[date, date + 1)` span of an all-day event.
///
/// # Errors
///
/// Returns [`InvalidDateError`] when the input is not a real calendar date.
pub fn normalize(input: &str) -> Result<AllDaySpan, InvalidDateError> {
    let start = parse_date(input)?;
    let end = start
        .checked_add_days(Days::new(1))
        .ok_or_else(|| InvalidDateError {
            input: input.to_owned(),
        })?;
    Ok(AllDaySpan { start, end })
}
