//! History sources
//!
//! The bulk pipeline reads history through [`HistorySource`]. The crate ships
//! one implementation, [`csv_source::CsvHistorySource`], which reads local CSV
//! exports; network-backed sources live outside this crate.

use crate::identifier::SymbolId;
use crate::{DataKind, Granularity, HistoryRecord};
use chrono::{DateTime, Utc};

pub mod csv_source;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Source data could not be parsed
    #[error("parse error: {0}")]
    ParseError(String),

    /// Source does not serve this request
    #[error("unsupported request: {0}")]
    Unsupported(String),
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// One symbol's history over an inclusive UTC range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    /// Symbol to fetch
    pub symbol: SymbolId,
    /// Bar or tick size
    pub granularity: Granularity,
    /// Data kind
    pub kind: DataKind,
    /// Range start (inclusive)
    pub start: DateTime<Utc>,
    /// Range end (inclusive)
    pub end: DateTime<Utc>,
}

/// Source of historical records
pub trait HistorySource {
    /// Fetch the records of one symbol in `[request.start, request.end]`
    ///
    /// Records should come back sorted by time; callers tolerate duplicates
    /// (the last one wins when written).
    fn fetch_history(&self, request: &HistoryRequest) -> FetcherResult<Vec<HistoryRecord>>;
}

impl<T: HistorySource + ?Sized> HistorySource for &T {
    fn fetch_history(&self, request: &HistoryRequest) -> FetcherResult<Vec<HistoryRecord>> {
        (**self).fetch_history(request)
    }
}
