//! Local CSV history source
//!
//! Reads history exported as plain CSV: one row per record, the time in the
//! first column, the remaining columns passed through untouched. A header row
//! is skipped when its first column is not a time.
//!
//! File layout under the source directory:
//!
//! - non-derivatives and canonical chains: `{ticker}_{kind}.csv`
//! - futures: `{root}_{kind}_{expiry}.csv`
//! - options: `{root}_{kind}_{style}_{right}_{strike}_{expiry}.csv`
//!
//! All names are lowercase; `{strike}` is the strike times 10000.

use super::{FetcherError, FetcherResult, HistoryRequest, HistorySource};
use crate::config::DATE_FORMAT;
use crate::identifier::SymbolId;
use crate::{DataKind, HistoryRecord, Record};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use csv::ReaderBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Naive time formats accepted in the time column
const NAIVE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y%m%d %H:%M",
];

/// Time column value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeField {
    /// Carries an offset
    Absolute(DateTime<Utc>),
    /// Wall time without zone
    Naive(NaiveDateTime),
}

fn parse_time_field(value: &str) -> Option<TimeField> {
    let value = value.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Some(TimeField::Absolute(time.with_timezone(&Utc)));
    }
    for format in NAIVE_TIME_FORMATS {
        if let Ok(time) = NaiveDateTime::parse_from_str(value, format) {
            return Some(TimeField::Naive(time));
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(value, DATE_FORMAT).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(TimeField::Naive)
}

/// Read `(time, fields)` rows of a CSV file
fn read_rows(path: &Path) -> FetcherResult<Vec<(TimeField, Vec<String>)>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| FetcherError::IoError(format!("{}: {e}", path.display())))?;

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let row = result
            .map_err(|e| FetcherError::ParseError(format!("{}: {e}", path.display())))?;
        let Some(first) = row.get(0) else {
            continue;
        };
        if first.is_empty() && row.len() == 1 {
            continue;
        }

        match parse_time_field(first) {
            Some(time) => {
                let fields = row.iter().skip(1).map(str::to_string).collect();
                rows.push((time, fields));
            }
            None if index == 0 => {
                debug!(path = %path.display(), "Skipping header row");
            }
            None => {
                return Err(FetcherError::ParseError(format!(
                    "{}: row {}: invalid time '{first}'",
                    path.display(),
                    index + 1
                )));
            }
        }
    }
    Ok(rows)
}

/// Read records whose times are wall times in `timezone`
///
/// Naive times are taken as-is; times carrying an offset are converted to
/// `timezone`. Row order is preserved.
pub fn read_local_records(path: &Path, timezone: Tz) -> FetcherResult<Vec<Record>> {
    let rows = read_rows(path)?;
    Ok(rows
        .into_iter()
        .map(|(time, fields)| {
            let time = match time {
                TimeField::Absolute(t) => t.with_timezone(&timezone).naive_local(),
                TimeField::Naive(t) => t,
            };
            Record::new(time, fields)
        })
        .collect())
}

/// Source file name for a symbol and data kind
pub fn source_file_name(symbol: &SymbolId, kind: DataKind) -> String {
    let mut name = format!("{}_{}", symbol.ticker(), kind);
    if let Some(style) = symbol.style().filter(|_| symbol.contract().is_some()) {
        name.push('_');
        name.push_str(style.as_str());
    }
    if let Some(contract) = symbol.contract() {
        if let (Some(terms), Some(strike)) = (contract.option, symbol.scaled_strike()) {
            name.push_str(&format!("_{}_{strike}", terms.right.as_str()));
        }
        name.push_str(&format!("_{}", contract.expiry.format(DATE_FORMAT)));
    }
    format!("{}.csv", name.to_lowercase())
}

/// History source backed by a directory of CSV files with UTC times
#[derive(Debug, Clone)]
pub struct CsvHistorySource {
    dir: PathBuf,
}

impl CsvHistorySource {
    /// Create a source reading from `dir`
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file serving `symbol`
    pub fn file_for(&self, symbol: &SymbolId, kind: DataKind) -> PathBuf {
        self.dir.join(source_file_name(symbol, kind))
    }
}

impl HistorySource for CsvHistorySource {
    fn fetch_history(&self, request: &HistoryRequest) -> FetcherResult<Vec<HistoryRecord>> {
        let path = self.file_for(&request.symbol, request.kind);
        if !path.exists() {
            warn!(
                symbol = %request.symbol,
                path = %path.display(),
                "No history file for symbol"
            );
            return Ok(Vec::new());
        }

        let mut records: Vec<HistoryRecord> = read_rows(&path)?
            .into_iter()
            .map(|(time, fields)| {
                let time = match time {
                    TimeField::Absolute(t) => t,
                    TimeField::Naive(t) => t.and_utc(),
                };
                HistoryRecord::new(time, fields)
            })
            .filter(|r| r.time >= request.start && r.time <= request.end)
            .collect();
        records.sort_by_key(|r| r.time);

        debug!(
            symbol = %request.symbol,
            path = %path.display(),
            records = records.len(),
            "Read history file"
        );
        Ok(records)
    }
}
