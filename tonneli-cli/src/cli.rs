use std::path::PathBuf;

use anyhow::{Result, bail};
use chrono::{FixedOffset, Offset, Utc};
use clap::{Parser, ValueEnum};
use tonneli_provider_google::{Credentials, DEFAULT_BASE_URL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Table sorted by date, followed by totals.
    Text,
    /// Outcomes in sync order as JSON.
    Json,
}

/// Sync waste collection schedules to Google Calendar.
#[derive(Debug, Parser)]
#[command(name = "tonneli-sync", version, about)]
pub(crate) struct Cli {
    /// Path to the waste calendar JSON file.
    #[arg(short, long)]
    pub file: PathBuf,

    /// Calendar that receives the pickup events.
    #[arg(long, env = "CALENDAR_ID")]
    pub calendar_id: String,

    /// Google service-account JSON key.
    #[arg(long, env = "SERVICE_ACCOUNT_KEY_PATH")]
    pub service_account_key: Option<PathBuf>,

    /// Pre-issued OAuth access token, used when no service-account key is given.
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Calendar API root.
    #[arg(long, env = "GOOGLE_CALENDAR_API_URL", default_value = DEFAULT_BASE_URL)]
    pub api_url: String,

    /// UTC offset of the day window used to look for existing events, e.g. `+02:00`.
    #[arg(
        long,
        env = "TONNELI_UTC_OFFSET",
        default_value = "UTC",
        allow_hyphen_values = true,
        value_parser = parse_offset
    )]
    pub utc_offset: FixedOffset,

    /// HTTP request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl Cli {
    /// Pick the credential source, preferring the service-account key.
    pub(crate) fn credentials(&self) -> Result<Credentials> {
        if let Some(path) = &self.service_account_key {
            return Ok(Credentials::ServiceAccountKey(path.clone()));
        }
        match self.access_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(Credentials::AccessToken(token.to_owned())),
            _ => bail!(
                "No credentials configured: pass --service-account-key (SERVICE_ACCOUNT_KEY_PATH) \
                 or --access-token (GOOGLE_ACCESS_TOKEN)"
            ),
        }
    }
}

fn parse_offset(raw: &str) -> Result<FixedOffset, String> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
        return Ok(Utc.fix());
    }
    trimmed
        .parse::<FixedOffset>()
        .map_err(|err| format!("expected an offset like +02:00 or UTC: {err}"))
}
