use owo_colors::OwoColorize;
use serde::Serialize;
use tonneli_core::{SyncOutcome, SyncReport, SyncStatus};

const TYPE_HEADER: &str = "Type";
const DATE_HEADER: &str = "Date";
const STATUS_HEADER: &str = "Status";

/// Result table sorted by date with a totals line.
pub(crate) fn render_text(outcomes: &[SyncOutcome], complete: bool, color: bool) -> String {
    let report = SyncReport::new(outcomes);
    let rows = report.by_date();

    let type_width = rows
        .iter()
        .map(|row| row.label.len())
        .chain([TYPE_HEADER.len()])
        .max()
        .unwrap_or_default();
    let date_width = rows
        .iter()
        .map(|row| row.date.len())
        .chain([DATE_HEADER.len()])
        .max()
        .unwrap_or_default();

    let heading = if complete {
        "Sync complete"
    } else {
        "Sync incomplete, showing processed items"
    };

    let mut lines = Vec::with_capacity(rows.len() + 4);
    lines.push(paint(heading, color, Paint::Heading));
    lines.push(format!(
        "{TYPE_HEADER:<type_width$}  {DATE_HEADER:<date_width$}  {STATUS_HEADER}"
    ));

    for row in rows {
        let (status, paint_as) = match row.status {
            SyncStatus::Added => ("Added", Paint::Added),
            SyncStatus::Skipped => ("Skipped (exists)", Paint::Skipped),
        };
        lines.push(format!(
            "{:<type_width$}  {:<date_width$}  {}",
            row.label,
            row.date,
            paint(status, color, paint_as)
        ));
    }

    lines.push(String::new());
    lines.push(format!(
        "Total Added: {} | Total Skipped: {}",
        paint(&report.added().to_string(), color, Paint::Added),
        paint(&report.skipped().to_string(), color, Paint::Skipped),
    ));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    complete: bool,
    added: usize,
    skipped: usize,
    outcomes: &'a [SyncOutcome],
}

/// Outcomes in sync order plus totals, as pretty JSON.
pub(crate) fn render_json(outcomes: &[SyncOutcome], complete: bool) -> serde_json::Result<String> {
    let report = SyncReport::new(outcomes);
    serde_json::to_string_pretty(&JsonReport {
        complete,
        added: report.added(),
        skipped: report.skipped(),
        outcomes: report.outcomes(),
    })
}

#[derive(Clone, Copy)]
enum Paint {
    Heading,
    Added,
    Skipped,
}

fn paint(text: &str, color: bool, paint_as: Paint) -> String {
    if !color {
        return text.to_owned();
    }
    match paint_as {
        Paint::Heading => text.bold().green().to_string(),
        Paint::Added => text.green().to_string(),
        Paint::Skipped => text.yellow().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(label: &str, date: &str, status: SyncStatus) -> SyncOutcome {
        SyncOutcome {
            label: label.to_owned(),
            date: date.to_owned(),
            status,
        }
    }

    fn sample() -> Vec<SyncOutcome> {
        vec![
            outcome("Plastic Garbage", "2024-06-15", SyncStatus::Added),
            outcome("Paper Garbage", "2024-06-03", SyncStatus::Skipped),
        ]
    }

    #[test]
    fn text_table_is_sorted_by_date_with_totals() {
        let text = render_text(&sample(), true, false);
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(
            lines,
            [
                "Sync complete",
                "Type             Date        Status",
                "Paper Garbage    2024-06-03  Skipped (exists)",
                "Plastic Garbage  2024-06-15  Added",
                "",
                "Total Added: 1 | Total Skipped: 1",
            ]
        );
    }

    #[test]
    fn interrupted_run_is_labelled() {
        let text = render_text(&[], false, false);
        assert!(text.starts_with("Sync incomplete"), "{text}");
        assert!(text.contains("Total Added: 0 | Total Skipped: 0"));
    }

    #[test]
    fn json_keeps_sync_order() {
        let json = render_json(&sample(), true).expect("serializable");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");

        assert_eq!(value["added"], 1);
        assert_eq!(value["outcomes"][0]["date"], "2024-06-15");
        assert_eq!(value["outcomes"][1]["status"], "skipped");
    }
}
