//! Streaming writer
//!
//! Consumes records sorted by time, buffers them per archive and flushes each
//! buffer through the [`ArchiveMergeEngine`] when the next record belongs to a
//! different archive file. For coarse granularities every record maps to the
//! same archive, so one call produces a single flush.

use super::merge::ArchiveMergeEngine;
use super::path::{self, ArchiveLocation, PathError, StorageMode};
use super::{ArchiveError, LineCodec, WriteBuffer};
use crate::config::WriterSettings;
use crate::identifier::{InstrumentCategory, SymbolId};
use crate::Record;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{debug, info};

/// Streaming writer errors
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    /// Category has no storage convention
    #[error("unsupported instrument category: {0}")]
    UnsupportedCategory(InstrumentCategory),

    /// Input was not sorted ascending by time
    #[error("record at {current} is earlier than the preceding record at {previous}")]
    OrderingViolation {
        /// Time of the preceding record
        previous: NaiveDateTime,
        /// Time of the offending record
        current: NaiveDateTime,
    },

    /// Archive read or write failed
    #[error("archive write failed: {0}")]
    Archive(#[from] ArchiveError),
}

impl From<PathError> for WriterError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::UnsupportedCategory(category) => WriterError::UnsupportedCategory(category),
        }
    }
}

/// Totals of one [`StreamingWriter::write`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Records consumed
    pub records: usize,
    /// Archive entries flushed
    pub archives_written: usize,
    /// Distinct lines handed to the merge engine
    pub lines_written: usize,
}

/// Writes one symbol's sorted records into its archives
#[derive(Debug)]
pub struct StreamingWriter {
    symbol: SymbolId,
    settings: WriterSettings,
    mode: StorageMode,
    engine: ArchiveMergeEngine,
}

impl StreamingWriter {
    /// Create a writer for `symbol`
    ///
    /// Fails with [`WriterError::UnsupportedCategory`] when the symbol's
    /// category has no storage convention.
    pub fn new<C>(symbol: SymbolId, settings: WriterSettings, codec: C) -> Result<Self, WriterError>
    where
        C: LineCodec + 'static,
    {
        Self::with_shared_codec(symbol, settings, Arc::new(codec))
    }

    /// Create a writer sharing an existing codec
    pub fn with_shared_codec(
        symbol: SymbolId,
        settings: WriterSettings,
        codec: Arc<dyn LineCodec>,
    ) -> Result<Self, WriterError> {
        let mode = StorageMode::lookup(symbol.category(), settings.granularity)?;
        let engine = ArchiveMergeEngine::new(codec, settings.granularity);
        Ok(Self {
            symbol,
            settings,
            mode,
            engine,
        })
    }

    /// Symbol this writer stores
    pub fn symbol(&self) -> &SymbolId {
        &self.symbol
    }

    /// Storage mode used for every flush
    pub fn storage_mode(&self) -> StorageMode {
        self.mode
    }

    /// Write records sorted ascending by time
    ///
    /// A record earlier than its predecessor stops the call with
    /// [`WriterError::OrderingViolation`]. Archives flushed before that point
    /// stay written; buffered lines of the unfinished archive are dropped.
    pub fn write<I>(&mut self, records: I) -> Result<WriteSummary, WriterError>
    where
        I: IntoIterator<Item = Record>,
    {
        let span = tracing::info_span!(
            "write",
            symbol = %self.symbol,
            granularity = %self.settings.granularity,
            kind = %self.settings.kind
        );
        let _enter = span.enter();

        let mut summary = WriteSummary::default();
        let mut last_time: Option<NaiveDateTime> = None;
        let mut active: Option<ArchiveLocation> = None;
        let mut buffer = WriteBuffer::new();

        for record in records {
            if let Some(previous) = last_time {
                if record.time < previous {
                    return Err(WriterError::OrderingViolation {
                        previous,
                        current: record.time,
                    });
                }
            }

            let new_date = last_time.map(|t| t.date()) != Some(record.time.date());
            if new_date {
                let location = path::resolve(
                    &self.settings.data_dir,
                    &self.symbol,
                    record.time,
                    self.settings.granularity,
                    self.settings.kind,
                )?;

                let same_file = active.as_ref().map(|a| &a.file) == Some(&location.file);
                if !same_file {
                    // The active location was resolved from the previous date
                    if let Some(previous) = active.take() {
                        self.flush(&previous, &mut buffer, &mut summary)?;
                    }
                    active = Some(location);
                }
            }

            buffer.push(&record, self.engine.codec(), self.settings.granularity);
            last_time = Some(record.time);
            summary.records += 1;
        }

        if let Some(location) = active {
            self.flush(&location, &mut buffer, &mut summary)?;
        }

        info!(
            records = summary.records,
            archives = summary.archives_written,
            lines = summary.lines_written,
            "Write completed"
        );
        Ok(summary)
    }

    fn flush(
        &self,
        location: &ArchiveLocation,
        buffer: &mut WriteBuffer,
        summary: &mut WriteSummary,
    ) -> Result<(), WriterError> {
        if buffer.is_empty() {
            return Ok(());
        }

        debug!(
            path = %location.file.display(),
            entry = %location.entry,
            lines = buffer.len(),
            "Flushing buffer"
        );
        self.engine
            .write(&location.file, &location.entry, buffer, self.mode)?;

        summary.archives_written += 1;
        summary.lines_written += buffer.len();
        buffer.clear();
        Ok(())
    }
}
