//! Command-line tool that pushes a waste collection schedule into Google Calendar.
#![expect(
    clippy::print_stdout,
    reason = "the sync report is the tool's output and goes to stdout"
)]

mod cli;
mod output;

use std::io::{self, IsTerminal};
use std::time::Duration as StdDuration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use reqwest::Client;
use tonneli_core::{GatewayFactory, SyncError, SyncOutcome, SyncService, WasteCalendar};
use tonneli_provider_google::GoogleGatewayFactory;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, OutputFormat};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        warn!(error = %err, "ignoring unreadable .env file");
    }

    let cli = Cli::parse();
    run(&cli).await
}

async fn run(cli: &Cli) -> Result<()> {
    // Input is checked before any credentials are touched.
    let text = tokio::fs::read_to_string(&cli.file)
        .await
        .with_context(|| format!("Failed to read waste calendar file {}", cli.file.display()))?;
    let calendar = WasteCalendar::from_json_str(&text)
        .with_context(|| format!("Invalid waste calendar in {}", cli.file.display()))?;
    info!(dates = calendar.len(), "waste calendar validated");

    // HTTP + gateway setup
    let client = Client::builder()
        .user_agent(concat!("tonneli-sync/", env!("CARGO_PKG_VERSION")))
        .timeout(StdDuration::from_secs(cli.timeout_secs))
        .build()?;
    let factory = GoogleGatewayFactory::new(client, cli.calendar_id.clone(), cli.credentials()?)
        .with_base_url(cli.api_url.clone())
        .with_utc_offset(cli.utc_offset);
    let gateway = factory
        .connect()
        .await
        .context("Failed to authenticate with Google Calendar")?;
    let service = SyncService::new(gateway);

    let mut outcomes = Vec::with_capacity(calendar.len());
    let finished = tokio::select! {
        result = service.sync_into(&calendar, &mut outcomes) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let conclusion = conclude(cli.format, &outcomes, finished);
    if let Some(rendered) = conclusion.rendered {
        print!("{rendered}");
    }
    conclusion.result
}

/// Report text for a run and the exit result it maps to.
struct Conclusion {
    rendered: Option<String>,
    result: Result<()>,
}

/// `finished` is `None` when the run was interrupted before the reconciler returned.
fn conclude(
    format: OutputFormat,
    outcomes: &[SyncOutcome],
    finished: Option<Result<(), SyncError>>,
) -> Conclusion {
    match finished {
        Some(Ok(())) => Conclusion {
            rendered: render(format, outcomes, true),
            result: Ok(()),
        },
        Some(Err(err)) => Conclusion {
            rendered: if outcomes.is_empty() {
                None
            } else {
                render(format, outcomes, false)
            },
            result: Err(anyhow::Error::new(err)
                .context(format!("Sync stopped after {} item(s)", outcomes.len()))),
        },
        None => {
            warn!(processed = outcomes.len(), "sync interrupted");
            Conclusion {
                rendered: render(format, outcomes, false),
                result: Err(anyhow!("Sync interrupted after {} item(s)", outcomes.len())),
            }
        }
    }
}

fn render(format: OutputFormat, outcomes: &[SyncOutcome], complete: bool) -> Option<String> {
    match format {
        OutputFormat::Text => Some(output::render_text(
            outcomes,
            complete,
            io::stdout().is_terminal(),
        )),
        OutputFormat::Json => match output::render_json(outcomes, complete) {
            Ok(mut json) => {
                json.push('\n');
                Some(json)
            }
            Err(err) => {
                error!(error = %err, "failed to render sync report");
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use tonneli_core::{GatewayError, SyncStatus};

    use super::*;

    fn added(date: &str) -> SyncOutcome {
        SyncOutcome {
            label: "Paper Garbage".to_owned(),
            date: date.to_owned(),
            status: SyncStatus::Added,
        }
    }

    #[test]
    fn completed_run_reports_and_succeeds() {
        let conclusion = conclude(OutputFormat::Json, &[added("2024-06-03")], Some(Ok(())));

        assert!(conclusion.result.is_ok());
        let rendered = conclusion.rendered.expect("report printed");
        let value: serde_json::Value = serde_json::from_str(&rendered).expect("valid json");
        assert_eq!(value["complete"], true);
    }

    #[test]
    fn failed_run_keeps_processed_rows_and_the_sync_error() {
        let outcomes = [added("2024-06-03"), added("2024-06-10")];
        let failure = SyncError::Gateway(GatewayError::NotFound("calendar".into()));

        let conclusion = conclude(OutputFormat::Text, &outcomes, Some(Err(failure)));

        let rendered = conclusion.rendered.expect("partial report printed");
        assert!(rendered.starts_with("Sync incomplete"), "{rendered}");
        assert!(rendered.contains("2024-06-10"));
        let err = conclusion.result.expect_err("run failed");
        assert_eq!(err.to_string(), "Sync stopped after 2 item(s)");
        assert!(err.downcast_ref::<SyncError>().is_some());
    }

    #[test]
    fn failure_before_any_item_prints_nothing() {
        let failure = SyncError::Gateway(GatewayError::Unauthorized("expired".into()));

        let conclusion = conclude(OutputFormat::Text, &[], Some(Err(failure)));

        assert!(conclusion.rendered.is_none());
        assert!(conclusion.result.is_err());
    }

    #[test]
    fn interrupted_run_reports_prefix() {
        let conclusion = conclude(OutputFormat::Json, &[added("2024-06-03")], None);

        let rendered = conclusion.rendered.expect("partial report printed");
        let value: serde_json::Value = serde_json::from_str(&rendered).expect("valid json");
        assert_eq!(value["complete"], false);
        assert_eq!(value["outcomes"].as_array().map(Vec::len), Some(1));
        let err = conclusion.result.expect_err("interrupted");
        assert_eq!(err.to_string(), "Sync interrupted after 1 item(s)");
    }
}
