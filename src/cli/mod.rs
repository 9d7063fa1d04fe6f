//! CLI command implementations

use crate::config::{WriterSettings, DEFAULT_DATA_DIR, DEFAULT_TIMEZONE};
use crate::{DataKind, Granularity};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

pub mod backfill;
pub mod error;
pub mod import;
pub mod inspect;
pub mod resolve;

pub use backfill::BackfillArgs;
pub use error::CliError;
pub use import::ImportArgs;
pub use inspect::InspectArgs;
pub use resolve::ResolveArgs;

/// Market archive CLI
#[derive(Parser, Debug)]
#[command(name = "market-archive")]
#[command(about = "Write and merge date-partitioned market data archives", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Data root directory archives are written under
    #[arg(long, global = true, env = "MARKET_ARCHIVE_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Timezone record times are written in (IANA name)
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEZONE, value_parser = parse_timezone)]
    pub timezone: Tz,

    /// Storage granularity: tick, second, minute, hour or daily
    #[arg(long, global = true, default_value = "minute")]
    pub granularity: Granularity,

    /// Data kind: trade, quote or openinterest
    #[arg(long, global = true, default_value = "trade")]
    pub kind: DataKind,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Print collected metrics in Prometheus text format after the command
    #[arg(long, global = true, default_value_t = false)]
    pub print_metrics: bool,
}

impl Cli {
    /// Writer settings built from the global flags
    pub fn settings(&self) -> WriterSettings {
        WriterSettings::new(self.data_dir.clone())
            .with_granularity(self.granularity)
            .with_kind(self.kind)
            .with_timezone(self.timezone)
    }

    /// Run the selected command
    pub fn execute(&self) -> Result<(), CliError> {
        match &self.command {
            Commands::Import(args) => args.execute(self),
            Commands::Backfill(args) => args.execute(self),
            Commands::Inspect(args) => args.execute(self),
            Commands::Resolve(args) => args.execute(self),
        }
    }
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a local CSV file of one symbol's records into archives
    Import(ImportArgs),

    /// Backfill a group of derivative contracts from a directory of CSV exports
    Backfill(BackfillArgs),

    /// List the entries of an archive or print one entry
    Inspect(InspectArgs),

    /// Print the archive path and entry name for a symbol and date
    Resolve(ResolveArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

fn parse_timezone(s: &str) -> Result<Tz, String> {
    s.parse::<Tz>()
        .map_err(|e| format!("Invalid timezone '{s}': {e}"))
}

/// Print `value` as pretty JSON
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::SerializationError(e.to_string()))?;
    println!("{json}");
    Ok(())
}

/// Parse a calendar date in `YYYY-MM-DD` or `YYYYMMDD` form
pub(crate) fn parse_date(input: &str) -> Result<NaiveDate, CliError> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(input, "%Y%m%d"))
        .map_err(|e| CliError::InvalidArgument(format!("Invalid date '{input}': {e}")))
}

/// Try to parse an RFC3339 time; a missing zone designator means UTC
fn try_parse_datetime_rfc3339(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&format!("{input}Z")) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}

/// Parse a start time from a date (start of day, UTC) or an RFC3339 time
pub(crate) fn parse_start_time(input: &str) -> Result<DateTime<Utc>, CliError> {
    if let Some(dt) = try_parse_datetime_rfc3339(input) {
        return Ok(dt);
    }

    let datetime = parse_date(input)?
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CliError::InvalidArgument("Invalid start time".to_string()))?;
    Ok(datetime.and_utc())
}

/// Parse an end time from a date (end of day, UTC) or an RFC3339 time
///
/// A bare date uses 23:59:59.999 so the whole date is included.
pub(crate) fn parse_end_time(input: &str) -> Result<DateTime<Utc>, CliError> {
    if let Some(dt) = try_parse_datetime_rfc3339(input) {
        return Ok(dt);
    }

    let datetime = parse_date(input)?
        .and_hms_milli_opt(23, 59, 59, 999)
        .ok_or_else(|| CliError::InvalidArgument("Invalid end time".to_string()))?;
    Ok(datetime.and_utc())
}
