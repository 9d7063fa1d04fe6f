//! Bulk history pipeline

use super::BulkError;
use crate::config::WriterSettings;
use crate::fetcher::{HistoryRequest, HistorySource};
use crate::identifier::SymbolId;
use crate::metrics::{self, ArchiveWriteMetrics};
use crate::output::path;
use crate::output::{ArchiveFile, ArchiveMergeEngine, LineCodec, WriteBuffer};
use crate::{DataKind, Granularity, Record};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Fetched history split by storage granularity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionedHistory {
    /// Hour/daily: every record of a symbol goes to its all-time entry
    Coarse(Vec<(SymbolId, Vec<Record>)>),
    /// Tick/second/minute: each symbol's records grouped by date
    Fine(Vec<(SymbolId, BTreeMap<NaiveDate, Vec<Record>>)>),
}

impl PartitionedHistory {
    /// Split `history` by the partition unit of `granularity`
    pub fn partition(history: Vec<(SymbolId, Vec<Record>)>, granularity: Granularity) -> Self {
        if granularity.is_coarse() {
            return PartitionedHistory::Coarse(history);
        }

        let grouped = history
            .into_iter()
            .map(|(symbol, records)| {
                let mut by_date: BTreeMap<NaiveDate, Vec<Record>> = BTreeMap::new();
                for record in records {
                    by_date.entry(record.time.date()).or_default().push(record);
                }
                (symbol, by_date)
            })
            .collect();
        PartitionedHistory::Fine(grouped)
    }
}

/// Totals of one [`BulkHistoryPipeline::download_and_save`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSummary {
    /// Symbols fetched
    pub symbols: usize,
    /// Records fetched
    pub records: usize,
    /// Archive files saved
    pub archives_written: usize,
    /// Entries written across all archives
    pub entries_written: usize,
    /// Distinct lines in written entries
    pub lines_written: usize,
    /// Dates written (fine granularities only)
    pub dates_written: usize,
}

/// Fetches and archives history for a group of contracts of one root
#[derive(Debug, Clone)]
pub struct BulkHistoryPipeline {
    settings: WriterSettings,
    engine: ArchiveMergeEngine,
}

impl BulkHistoryPipeline {
    /// Create a pipeline rendering lines with `codec`
    pub fn new<C>(settings: WriterSettings, codec: C) -> Self
    where
        C: LineCodec + 'static,
    {
        Self::with_shared_codec(settings, Arc::new(codec))
    }

    /// Create a pipeline sharing an existing codec
    pub fn with_shared_codec(settings: WriterSettings, codec: Arc<dyn LineCodec>) -> Self {
        let engine = ArchiveMergeEngine::new(codec, settings.granularity);
        Self { settings, engine }
    }

    /// Settings this pipeline writes with
    pub fn settings(&self) -> &WriterSettings {
        &self.settings
    }

    /// Fetch history of `symbols` over `[start, end]` and write it to archives
    ///
    /// # Errors
    ///
    /// - [`BulkError::InvalidRequest`] when the list is empty, the data kind is
    ///   not trade or quote, the category is not a future or option category,
    ///   or the symbols differ in category, root ticker, market or option
    ///   style
    /// - [`BulkError::Fetcher`] when the source fails for a symbol
    /// - [`BulkError::Archive`] when a coarse archive cannot be saved
    /// - [`BulkError::DateFailed`] when a fine date archive cannot be saved
    pub fn download_and_save(
        &self,
        source: &dyn HistorySource,
        symbols: &[SymbolId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BulkSummary, BulkError> {
        let result = self.run(source, symbols, start, end);
        metrics::record_bulk_request(result.is_ok());
        result
    }

    fn run(
        &self,
        source: &dyn HistorySource,
        symbols: &[SymbolId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BulkSummary, BulkError> {
        self.validate(symbols, start, end)?;
        let canonical = symbols[0].canonical();

        let span = tracing::info_span!(
            "download_and_save",
            canonical = %canonical,
            symbols = symbols.len(),
            granularity = %self.settings.granularity,
            kind = %self.settings.kind
        );
        let _enter = span.enter();

        info!(start = %start, end = %end, "Starting bulk history download");

        let mut summary = BulkSummary {
            symbols: symbols.len(),
            ..BulkSummary::default()
        };

        let mut history = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let request = HistoryRequest {
                symbol: symbol.clone(),
                granularity: self.settings.granularity,
                kind: self.settings.kind,
                start,
                end,
            };
            let fetched = source
                .fetch_history(&request)
                .map_err(|source| BulkError::Fetcher {
                    symbol: symbol.clone(),
                    source,
                })?;

            debug!(symbol = %symbol, records = fetched.len(), "Fetched history");
            summary.records += fetched.len();

            let records: Vec<Record> = fetched
                .into_iter()
                .map(|r| r.into_local(self.settings.timezone))
                .collect();
            history.push((symbol.clone(), records));
        }

        match PartitionedHistory::partition(history, self.settings.granularity) {
            PartitionedHistory::Coarse(history) => self.write_coarse(history, &mut summary)?,
            PartitionedHistory::Fine(history) => {
                let tz = self.settings.timezone;
                let first = start.with_timezone(&tz).date_naive();
                let last = end.with_timezone(&tz).date_naive();
                self.write_fine(&canonical, history, first, last, &mut summary)?
            }
        }

        info!(
            records = summary.records,
            archives = summary.archives_written,
            entries = summary.entries_written,
            dates = summary.dates_written,
            "Bulk history download completed"
        );
        Ok(summary)
    }

    fn validate(
        &self,
        symbols: &[SymbolId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), BulkError> {
        let Some(first) = symbols.first() else {
            return Err(BulkError::InvalidRequest("symbol list is empty".to_string()));
        };

        if !matches!(self.settings.kind, DataKind::Trade | DataKind::Quote) {
            return Err(BulkError::InvalidRequest(format!(
                "data kind must be trade or quote, got {}",
                self.settings.kind
            )));
        }

        let category = first.category();
        if !category.is_derivative() {
            return Err(BulkError::InvalidRequest(format!(
                "bulk backfill supports future and option categories, got {category}"
            )));
        }

        if let Some(other) = symbols.iter().find(|s| s.category() != category) {
            return Err(BulkError::InvalidRequest(format!(
                "mixed categories: {first} and {other}"
            )));
        }

        if let Some(other) = symbols.iter().find(|s| s.ticker() != first.ticker()) {
            return Err(BulkError::InvalidRequest(format!(
                "mixed root tickers: {} and {}",
                first.ticker(),
                other.ticker()
            )));
        }

        // Archive paths come from the first symbol's chain
        if let Some(other) = symbols.iter().find(|s| s.market() != first.market()) {
            return Err(BulkError::InvalidRequest(format!(
                "mixed markets: {first} and {other}"
            )));
        }

        // Option styles name different date archives
        if let Some(other) = symbols.iter().find(|s| s.style() != first.style()) {
            return Err(BulkError::InvalidRequest(format!(
                "mixed option styles: {first} and {other}"
            )));
        }

        if start > end {
            return Err(BulkError::InvalidRequest(format!(
                "start {start} is after end {end}"
            )));
        }

        Ok(())
    }

    /// Merge each symbol into its all-time archive; each archive is saved once
    fn write_coarse(
        &self,
        history: Vec<(SymbolId, Vec<Record>)>,
        summary: &mut BulkSummary,
    ) -> Result<(), BulkError> {
        let granularity = self.settings.granularity;
        let mut archives: BTreeMap<PathBuf, ArchiveFile> = BTreeMap::new();
        let mut lines: BTreeMap<PathBuf, usize> = BTreeMap::new();

        for (symbol, records) in history {
            let Some(first) = records.first() else {
                debug!(symbol = %symbol, "No history, skipping");
                continue;
            };

            let location = path::resolve(
                &self.settings.data_dir,
                &symbol,
                first.time,
                granularity,
                self.settings.kind,
            )?;
            let buffer = WriteBuffer::from_records(&records, self.engine.codec(), granularity);

            let archive = match archives.entry(location.file.clone()) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => slot.insert(ArchiveFile::open_or_empty(&location.file)?),
            };
            let outcome = self
                .engine
                .merge_into(archive, &location.entry, &buffer, true);

            debug!(
                symbol = %symbol,
                entry = %location.entry,
                lines = outcome.lines,
                change = %outcome.change,
                "Merged symbol history"
            );
            *lines.entry(location.file).or_default() += outcome.lines;
            summary.entries_written += 1;
            summary.lines_written += outcome.lines;
        }

        for (file, archive) in &archives {
            let write_metrics = ArchiveWriteMetrics::start("bulk_coarse");
            archive.save()?;
            write_metrics.record_success("saved", lines.get(file).copied().unwrap_or(0));
            info!(path = %file.display(), entries = archive.len(), "Archive written");
            summary.archives_written += 1;
        }
        Ok(())
    }

    /// Write one archive per date, replacing each symbol's entry for that date
    fn write_fine(
        &self,
        canonical: &SymbolId,
        history: Vec<(SymbolId, BTreeMap<NaiveDate, Vec<Record>>)>,
        first_date: NaiveDate,
        last_date: NaiveDate,
        summary: &mut BulkSummary,
    ) -> Result<(), BulkError> {
        let granularity = self.settings.granularity;
        let kind = self.settings.kind;
        for date in path::date_range(first_date, last_date) {
            let file =
                path::archive_path_for_date(&self.settings.data_dir, canonical, date, granularity, kind)?;

            let mut archive: Option<ArchiveFile> = None;
            let mut lines = 0;
            for (symbol, by_date) in &history {
                let Some(records) = by_date.get(&date).filter(|r| !r.is_empty()) else {
                    continue;
                };

                let entry = path::entry_name(symbol, date, granularity, kind)?;
                let buffer = WriteBuffer::from_records(records, self.engine.codec(), granularity);
                let archive = match archive {
                    Some(ref mut loaded) => loaded,
                    None => archive.insert(
                        ArchiveFile::open_or_empty(&file)
                            .map_err(|source| BulkError::DateFailed { date, source })?,
                    ),
                };
                let outcome = self.engine.merge_into(archive, &entry, &buffer, false);

                lines += outcome.lines;
                summary.entries_written += 1;
            }

            let Some(archive) = archive else {
                debug!(date = %date, "No data for date, skipping");
                continue;
            };

            let write_metrics = ArchiveWriteMetrics::start("bulk_fine");
            archive
                .save()
                .map_err(|source| BulkError::DateFailed { date, source })?;
            write_metrics.record_success("saved", lines);
            metrics::record_bulk_date();

            info!(
                date = %date,
                path = %file.display(),
                entries = archive.len(),
                lines = lines,
                "Date archive written"
            );
            summary.archives_written += 1;
            summary.dates_written += 1;
            summary.lines_written += lines;
        }
        Ok(())
    }
}
