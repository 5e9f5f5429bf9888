//! Schema validation for waste schedule documents.

use std::fmt;

use serde_json::Value;

use crate::dates::is_date_pattern;
use crate::model::{WasteCalendar, WasteCategory};

#[derive(Debug, Clone, PartialEq, Eq)]
/// One violation found while validating a schedule document.
pub struct ValidationIssue {
    /// JSON path of the offending value, e.g. `$.paper[2]`.
    pub path: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.path, self.message)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid waste calendar ({} issue(s)): {}", .issues.len(), join_issues(.issues))]
/// Every violation found in a rejected schedule document.
pub struct ValidationError {
    /// Violations in document order, never empty.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    /// Paths of all violations.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().map(|issue| issue.path.as_str())
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate an arbitrary JSON document into a [`WasteCalendar`].
///
/// The document must be an object holding exactly the five category keys,
/// each mapped to an array of `YYYY-MM-DD` strings. Nothing is coerced.
///
/// # Errors
///
/// Returns a [`ValidationError`] listing every violation when the document
/// does not have that shape.
pub fn validate(raw: &Value) -> Result<WasteCalendar, ValidationError> {
    let Some(object) = raw.as_object() else {
        return Err(ValidationError {
            issues: vec![issue("$", format!("expected object, found {}", kind(raw)))],
        });
    };

    let mut issues = Vec::new();
    let mut calendar = WasteCalendar::default();

    for category in WasteCategory::ALL {
        let path = format!("$.{}", category.key());
        match object.get(category.key()) {
            None => issues.push(issue(&path, "required key is missing".to_owned())),
            Some(Value::Array(items)) => {
                if let Some(dates) = validate_dates(&path, items, &mut issues) {
                    calendar.set_dates(category, dates);
                }
            }
            Some(other) => issues.push(issue(&path, format!("expected array, found {}", kind(other)))),
        }
    }

    for key in object.keys() {
        if WasteCategory::from_key(key).is_none() {
            issues.push(issue(&format!("$.{key}"), "unknown key".to_owned()));
        }
    }

    if issues.is_empty() {
        Ok(calendar)
    } else {
        Err(ValidationError { issues })
    }
}

impl WasteCalendar {
    /// Parse JSON text and validate it.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the text is not JSON (reported at
    /// path `$`) or the document fails [`validate`].
    pub fn from_json_str(text: &str) -> Result<Self, ValidationError> {
        let raw: Value = serde_json::from_str(text).map_err(|err| ValidationError {
            issues: vec![issue("$", format!("malformed JSON: {err}"))],
        })?;
        validate(&raw)
    }
}

fn validate_dates(
    path: &str,
    items: &[Value],
    issues: &mut Vec<ValidationIssue>,
) -> Option<Vec<String>> {
    let before = issues.len();
    let mut dates = Vec::with_capacity(items.len());

    for (idx, item) in items.iter().enumerate() {
        let item_path = format!("{path}[{idx}]");
        match item {
            Value::String(date) if is_date_pattern(date) => dates.push(date.clone()),
            Value::String(date) => issues.push(issue(
                &item_path,
                format!("date must be in YYYY-MM-DD format, found {date:?}"),
            )),
            other => issues.push(issue(
                &item_path,
                format!("expected string, found {}", kind(other)),
            )),
        }
    }

    (issues.len() == before).then_some(dates)
}

fn issue(path: &str, message: String) -> ValidationIssue {
    ValidationIssue {
        path: path.to_owned(),
        message,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn full_document() -> Value {
        json!({
            "metals_and_plastics": ["2024-06-01", "2024-06-15"],
            "paper": ["2024-06-03"],
            "glass": [],
            "bio": ["2024-06-04"],
            "mixed": ["2024-06-05"],
        })
    }

    #[test]
    fn accepts_complete_document_and_keeps_order() {
        let calendar = validate(&full_document()).expect("document is valid");
        assert_eq!(
            calendar.dates(WasteCategory::MetalsAndPlastics),
            ["2024-06-01", "2024-06-15"]
        );
        assert!(calendar.dates(WasteCategory::Glass).is_empty());
        assert_eq!(calendar.len(), 5);
    }

    #[test]
    fn rejects_document_missing_bio() {
        let mut doc = full_document();
        doc.as_object_mut().expect("object").remove("bio");

        let err = validate(&doc).expect_err("bio is required");
        assert_eq!(err.paths().collect::<Vec<_>>(), ["$.bio"]);
    }

    #[test]
    fn rejects_partial_document_with_bad_month() {
        let err = validate(&json!({ "paper": ["2024-13-01"] })).expect_err("keys are missing");
        let paths: Vec<_> = err.paths().collect();
        assert_eq!(paths, ["$.metals_and_plastics", "$.glass", "$.bio", "$.mixed"]);
    }

    #[test]
    fn aggregates_every_violation() {
        let doc = json!({
            "metals_and_plastics": ["2024-06-01", 20_240_601, "June 1st"],
            "paper": "2024-06-03",
            "glass": [null],
            "bio": [],
            "mixed": [],
            "residual": [],
        });

        let err = validate(&doc).expect_err("document is broken");
        let paths: Vec<_> = err.paths().collect();
        assert_eq!(
            paths,
            [
                "$.metals_and_plastics[1]",
                "$.metals_and_plastics[2]",
                "$.paper",
                "$.glass[0]",
                "$.residual",
            ]
        );
        assert!(err.to_string().contains("5 issue(s)"), "{err}");
    }

    #[test]
    fn rejects_non_object_root() {
        let err = validate(&json!([])).expect_err("array root");
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues.first().map(|found| found.path.as_str()), Some("$"));
    }

    #[test]
    fn malformed_json_text_is_a_validation_error() {
        let err = WasteCalendar::from_json_str("{ \"paper\": [").expect_err("truncated");
        assert!(err.issues.iter().all(|found| found.path == "$"));

        let calendar = WasteCalendar::from_json_str(&full_document().to_string())
            .expect("round trip through text");
        assert_eq!(calendar.dates(WasteCategory::Mixed), ["2024-06-05"]);
    }
}
