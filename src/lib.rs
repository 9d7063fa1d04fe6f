//! # Market Archive Library
//!
//! Storage layer for historical market data. Records (trades, quotes, bars)
//! are written into date-partitioned zip archives whose paths and entry names
//! follow a fixed naming scheme, and newly fetched history can be merged back
//! into existing archives without losing previously stored lines.
//!
//! ## Features
//!
//! - **Deterministic Layout**: One function maps a symbol, date, granularity and
//!   data kind to an archive path and entry name
//! - **Safe Merges**: Hour/daily archives are merged line-by-line keyed on timestamp
//! - **Atomic Replace**: Archives are staged to a temporary file and renamed into place
//! - **Streaming Writes**: Sorted record streams are split on calendar-day boundaries
//! - **Bulk Backfill**: Groups of derivative contracts are fetched and archived together
//!
//! ## Quick Start
//!
//! ```no_run
//! use market_archive::config::WriterSettings;
//! use market_archive::output::csv::CsvLineCodec;
//! use market_archive::output::writer::StreamingWriter;
//! use market_archive::{DataKind, Granularity, Record, SymbolId};
//! use chrono::NaiveDate;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let symbol = SymbolId::parse("EQUITY:USA:AAPL")?;
//! let settings = WriterSettings::new("./data")
//!     .with_granularity(Granularity::Daily)
//!     .with_kind(DataKind::Trade);
//!
//! let mut writer = StreamingWriter::new(symbol, settings, CsvLineCodec::new())?;
//! let time = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! writer.write(vec![Record::new(time, vec!["300.35".to_string(), "1000".to_string()])])?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`identifier`] - Symbol identity parsing and validation
//! - [`output`] - Path resolution, archive container, merge engine and streaming writer
//! - [`fetcher`] - History source interface and a local CSV implementation
//! - [`downloader`] - Bulk history pipeline for groups of derivative contracts
//! - [`config`] - Defaults and writer settings
//! - [`metrics`] - Counters for archive writes and merge fallbacks

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Defaults and writer settings
pub mod config;

/// Bulk history pipeline
pub mod downloader;

/// History sources
pub mod fetcher;

/// Symbol identity parsing and validation
pub mod identifier;

/// Archive metrics
pub mod metrics;

/// Archive layout, merging and writing
pub mod output;

pub use identifier::{InstrumentCategory, OptionRight, OptionStyle, SymbolId};

/// Time bucket size of stored records.
///
/// Ordered from finest to coarsest; [`Granularity::is_coarse`] decides both the
/// merge strategy and the archive partitioning unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Individual ticks
    Tick,
    /// 1 second bars
    Second,
    /// 1 minute bars
    Minute,
    /// 1 hour bars
    Hour,
    /// Daily bars
    Daily,
}

impl Granularity {
    /// Hour and daily data keep a symbol's whole history in one archive entry.
    pub fn is_coarse(&self) -> bool {
        *self >= Granularity::Hour
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Granularity::Tick => "tick",
            Granularity::Second => "second",
            Granularity::Minute => "minute",
            Granularity::Hour => "hour",
            Granularity::Daily => "daily",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tick" => Ok(Granularity::Tick),
            "second" => Ok(Granularity::Second),
            "minute" => Ok(Granularity::Minute),
            "hour" => Ok(Granularity::Hour),
            "daily" => Ok(Granularity::Daily),
            _ => Err(format!("Invalid granularity: {s}")),
        }
    }
}

/// Classification of a record's content. Affects naming only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    /// Trade prints and trade bars
    Trade,
    /// Quotes and quote bars
    Quote,
    /// Open interest
    OpenInterest,
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DataKind::Trade => "trade",
            DataKind::Quote => "quote",
            DataKind::OpenInterest => "openinterest",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DataKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trade" => Ok(DataKind::Trade),
            "quote" => Ok(DataKind::Quote),
            "openinterest" | "open_interest" => Ok(DataKind::OpenInterest),
            _ => Err(format!("Invalid data kind: {s}")),
        }
    }
}

/// A record ready to be written.
///
/// `time` is already expressed in the writer's display timezone. `fields` are
/// opaque to the archive layer and handed to the line codec untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record time in the display timezone
    pub time: NaiveDateTime,
    /// Pre-formatted field values following the timestamp
    pub fields: Vec<String>,
}

impl Record {
    /// Create a record from a local time and its field values
    pub fn new(time: NaiveDateTime, fields: Vec<String>) -> Self {
        Self { time, fields }
    }
}

/// A record as produced by a history source, timestamped in UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    /// Record time (UTC)
    pub time: DateTime<Utc>,
    /// Pre-formatted field values following the timestamp
    pub fields: Vec<String>,
}

impl HistoryRecord {
    /// Create a history record
    pub fn new(time: DateTime<Utc>, fields: Vec<String>) -> Self {
        Self { time, fields }
    }

    /// Convert into a [`Record`] whose time is the wall-clock time in `tz`
    pub fn into_local(self, tz: Tz) -> Record {
        Record {
            time: self.time.with_timezone(&tz).naive_local(),
            fields: self.fields,
        }
    }
}
