//! Bulk history backfill
//!
//! Fetches history for a group of related derivative contracts and writes it
//! into archives in one pass.
//!
//! # Overview
//!
//! 1. **Validation**: the request is checked before any fetch or file access
//! 2. **Fetch**: each symbol's history is read through a [`crate::fetcher::HistorySource`]
//!    and converted to the display timezone
//! 3. **Partition**: coarse granularities keep one record list per symbol,
//!    fine granularities group each symbol's records by date
//!    ([`pipeline::PartitionedHistory`])
//! 4. **Write**: coarse history is merged into all-time archives; fine history
//!    is written one date archive at a time
//!
//! # Quick Start
//!
//! ```no_run
//! use market_archive::config::WriterSettings;
//! use market_archive::downloader::BulkHistoryPipeline;
//! use market_archive::fetcher::csv_source::CsvHistorySource;
//! use market_archive::output::csv::CsvLineCodec;
//! use market_archive::{Granularity, SymbolId};
//! use chrono::{TimeZone, Utc};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = WriterSettings::new("./data").with_granularity(Granularity::Minute);
//! let pipeline = BulkHistoryPipeline::new(settings, CsvLineCodec::new());
//! let source = CsvHistorySource::new("./exports");
//!
//! let symbols = vec![
//!     SymbolId::parse("FUTURE:CME:ES:2020-03-20")?,
//!     SymbolId::parse("FUTURE:CME:ES:2020-06-19")?,
//! ];
//! let start = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();
//! let end = Utc.with_ymd_and_hms(2020, 1, 3, 23, 59, 59).unwrap();
//! let summary = pipeline.download_and_save(&source, &symbols, start, end)?;
//! println!("{} dates written", summary.dates_written);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Invalid requests fail with [`BulkError::InvalidRequest`] before anything is
//! read or written. A failed save on the fine path stops the run with
//! [`BulkError::DateFailed`]; dates saved earlier in the run stay on disk.

use crate::fetcher::FetcherError;
use crate::identifier::{InstrumentCategory, SymbolId};
use crate::output::{ArchiveError, PathError};
use chrono::NaiveDate;

pub mod pipeline;

pub use pipeline::{BulkHistoryPipeline, BulkSummary, PartitionedHistory};

/// Bulk pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum BulkError {
    /// Request failed validation; nothing was fetched or written
    #[error("invalid bulk request: {0}")]
    InvalidRequest(String),

    /// Category has no storage convention
    #[error("unsupported instrument category: {0}")]
    UnsupportedCategory(InstrumentCategory),

    /// History source failed
    #[error("failed to fetch history for {symbol}: {source}")]
    Fetcher {
        /// Symbol being fetched
        symbol: SymbolId,
        /// Underlying error
        #[source]
        source: FetcherError,
    },

    /// Archive read or write failed
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Saving one date's archive failed; earlier dates are kept
    #[error("failed to write archive for {date}: {source}")]
    DateFailed {
        /// Date whose archive could not be saved
        date: NaiveDate,
        /// Underlying error
        #[source]
        source: ArchiveError,
    },
}

impl From<PathError> for BulkError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::UnsupportedCategory(category) => BulkError::UnsupportedCategory(category),
        }
    }
}
