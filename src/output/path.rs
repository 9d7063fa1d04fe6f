//! Archive path and entry name resolution
//!
//! Every archive is addressed relative to a data root as
//! `{category}/{market}/{granularity}/...`. Fine granularities (tick, second,
//! minute) get one archive per calendar day under a per-ticker directory; coarse
//! granularities (hour, daily) get one archive per ticker (or per chain for
//! derivatives) that covers all time, so the timestamp is ignored.
//!
//! # Usage Example
//!
//! ```rust
//! use market_archive::output::path::resolve;
//! use market_archive::{DataKind, Granularity, SymbolId};
//! use chrono::NaiveDate;
//! use std::path::{Path, PathBuf};
//!
//! let aapl = SymbolId::parse("EQUITY:USA:AAPL").unwrap();
//! let time = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap().and_hms_opt(9, 31, 0).unwrap();
//!
//! let location = resolve(Path::new("data"), &aapl, time, Granularity::Minute, DataKind::Trade).unwrap();
//! assert_eq!(location.file, PathBuf::from("data/equity/usa/minute/aapl/20200102_trade.zip"));
//! assert_eq!(location.entry, "20200102_aapl_minute_trade.csv");
//! ```
//!
//! The output of this module is shared with every reader of the archives and
//! must not change without a format version bump.

use crate::config::{ARCHIVE_EXTENSION, DATE_FORMAT, ENTRY_EXTENSION};
use crate::identifier::{InstrumentCategory, OptionStyle, SymbolId};
use crate::{DataKind, Granularity};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};

/// Path resolution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Category has no storage convention
    #[error("unsupported instrument category: {0}")]
    UnsupportedCategory(InstrumentCategory),
}

/// Archive file and entry a record belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveLocation {
    /// Archive file path (data root included)
    pub file: PathBuf,
    /// Entry name inside the archive
    pub entry: String,
}

/// How a write treats data already on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// Hour/daily: existing entry lines are merged by timestamp
    CoarseMergeable,
    /// Fine derivatives: archive kept, this symbol's entry replaced
    AppendMergeable,
    /// Fine non-derivatives: any existing archive is discarded
    ReplaceOnly,
}

impl StorageMode {
    /// Look up the storage mode for a category at a granularity
    pub fn lookup(
        category: InstrumentCategory,
        granularity: Granularity,
    ) -> Result<Self, PathError> {
        layout(category)?;
        Ok(if granularity.is_coarse() {
            StorageMode::CoarseMergeable
        } else if category.is_derivative() {
            StorageMode::AppendMergeable
        } else {
            StorageMode::ReplaceOnly
        })
    }

    /// Whether existing entry lines are merged line-by-line
    pub fn is_mergeable(&self) -> bool {
        matches!(self, StorageMode::CoarseMergeable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Spot,
    Future,
    Option,
}

fn layout(category: InstrumentCategory) -> Result<Layout, PathError> {
    match category {
        InstrumentCategory::Equity
        | InstrumentCategory::Forex
        | InstrumentCategory::Cfd
        | InstrumentCategory::Crypto
        | InstrumentCategory::Index => Ok(Layout::Spot),
        InstrumentCategory::Future => Ok(Layout::Future),
        InstrumentCategory::Option
        | InstrumentCategory::FutureOption
        | InstrumentCategory::IndexOption => Ok(Layout::Option),
        InstrumentCategory::Commodity => Err(PathError::UnsupportedCategory(category)),
    }
}

/// Reject categories without a storage convention
pub fn ensure_supported(category: InstrumentCategory) -> Result<(), PathError> {
    layout(category).map(|_| ())
}

/// Resolve the archive file and entry name for a record
///
/// # Arguments
///
/// * `root` - Data root directory
/// * `symbol` - Symbol the record belongs to
/// * `time` - Record time; only its date is used, and only for fine granularities
/// * `granularity` - Storage granularity
/// * `kind` - Data kind
pub fn resolve(
    root: &Path,
    symbol: &SymbolId,
    time: NaiveDateTime,
    granularity: Granularity,
    kind: DataKind,
) -> Result<ArchiveLocation, PathError> {
    let date = time.date();
    Ok(ArchiveLocation {
        file: archive_path_for_date(root, symbol, date, granularity, kind)?,
        entry: entry_name(symbol, date, granularity, kind)?,
    })
}

/// Archive file holding `date` (ignored for coarse granularities)
///
/// Contracts of one chain resolve to the same file as their canonical symbol.
pub fn archive_path_for_date(
    root: &Path,
    symbol: &SymbolId,
    date: NaiveDate,
    granularity: Granularity,
    kind: DataKind,
) -> Result<PathBuf, PathError> {
    let layout = layout(symbol.category())?;
    let ticker = symbol.ticker().to_lowercase();
    let date = date.format(DATE_FORMAT);
    let dir = root
        .join(symbol.category().as_str())
        .join(symbol.market())
        .join(granularity.to_string());

    let path = match (layout, granularity.is_coarse()) {
        (Layout::Spot, true) if kind == DataKind::Trade => {
            dir.join(format!("{ticker}.{ARCHIVE_EXTENSION}"))
        }
        (Layout::Spot, true) | (Layout::Future, true) => {
            dir.join(format!("{ticker}_{kind}.{ARCHIVE_EXTENSION}"))
        }
        (Layout::Spot, false) | (Layout::Future, false) => dir
            .join(&ticker)
            .join(format!("{date}_{kind}.{ARCHIVE_EXTENSION}")),
        (Layout::Option, true) => dir.join(format!(
            "{ticker}_{kind}_{}.{ARCHIVE_EXTENSION}",
            style_of(symbol)
        )),
        (Layout::Option, false) => dir.join(&ticker).join(format!(
            "{date}_{kind}_{}.{ARCHIVE_EXTENSION}",
            style_of(symbol)
        )),
    };
    Ok(path)
}

/// Entry name inside the archive for `date` (ignored for coarse granularities)
pub fn entry_name(
    symbol: &SymbolId,
    date: NaiveDate,
    granularity: Granularity,
    kind: DataKind,
) -> Result<String, PathError> {
    let layout = layout(symbol.category())?;
    let ticker = symbol.ticker().to_lowercase();
    let date = date.format(DATE_FORMAT);
    let suffix = contract_suffix(symbol);

    let stem = match (layout, granularity.is_coarse()) {
        (Layout::Spot, true) if kind == DataKind::Trade => ticker,
        (Layout::Spot, true) => format!("{ticker}_{kind}"),
        (Layout::Spot, false) => format!("{date}_{ticker}_{granularity}_{kind}"),
        (Layout::Future, true) => format!("{ticker}_{kind}{suffix}"),
        (Layout::Future, false) => format!("{date}_{ticker}_{granularity}_{kind}{suffix}"),
        (Layout::Option, true) => format!("{ticker}_{kind}_{}{suffix}", style_of(symbol)),
        (Layout::Option, false) => format!(
            "{date}_{ticker}_{granularity}_{kind}_{}{suffix}",
            style_of(symbol)
        ),
    };
    Ok(format!("{stem}.{ENTRY_EXTENSION}"))
}

fn style_of(symbol: &SymbolId) -> &'static str {
    symbol.style().unwrap_or(OptionStyle::American).as_str()
}

/// `_{right}_{strike}_{expiry}` for options, `_{expiry}` for futures, empty otherwise
fn contract_suffix(symbol: &SymbolId) -> String {
    let Some(contract) = symbol.contract() else {
        return String::new();
    };
    let expiry = contract.expiry.format(DATE_FORMAT);
    match (&contract.option, symbol.scaled_strike()) {
        (Some(terms), Some(strike)) => {
            format!("_{}_{}_{}", terms.right.as_str(), strike, expiry)
        }
        _ => format!("_{expiry}"),
    }
}

/// Every calendar date from `start` to `end`, both inclusive
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        dates.push(current);
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    dates
}
