//! Archive layout, merging and writing
//!
//! - [`path`] - Deterministic archive path and entry name resolution
//! - [`archive`] - Zip container image with atomic staged saves
//! - [`merge`] - Read-modify-write of a single archive entry
//! - [`writer`] - Streaming writer splitting sorted records on day boundaries
//! - [`csv`] - Default line codec

use crate::config::LINE_SEPARATOR;
use crate::{Granularity, Record};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

pub mod archive;
pub mod csv;
pub mod merge;
pub mod path;
pub mod writer;

pub use archive::{ArchiveFile, StagedArchive};
pub use merge::{ArchiveMergeEngine, EntryChange, WriteOutcome};
pub use path::{resolve, ArchiveLocation, PathError, StorageMode};
pub use writer::{StreamingWriter, WriteSummary, WriterError};

/// Archive I/O errors
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Zip container error
    #[error("zip error: {0}")]
    ZipError(String),

    /// Staged archive could not replace the final file
    #[error("persist error: {0}")]
    PersistError(String),
}

/// Result type for archive operations
pub type OutputResult<T> = Result<T, ArchiveError>;

/// Line encoding of a single record
///
/// The archive layer never looks inside a line beyond asking the codec for its
/// leading timestamp when merging.
pub trait LineCodec: Send + Sync {
    /// Render a record into one line of text (no line terminator)
    fn render(&self, record: &Record, granularity: Granularity) -> String;

    /// Read the fixed-width leading timestamp of a stored line
    ///
    /// Returns `None` when the line cannot be parsed.
    fn parse_timestamp(&self, line: &str, granularity: Granularity) -> Option<NaiveDateTime>;
}

/// One entry's worth of lines keyed uniquely by timestamp
///
/// Inserting a line for a timestamp that is already present replaces it.
/// Iteration is ascending by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBuffer {
    lines: BTreeMap<NaiveDateTime, String>,
}

impl WriteBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a line, replacing any line already stored for `time`
    pub fn insert(&mut self, time: NaiveDateTime, line: String) {
        self.lines.insert(time, line);
    }

    /// Overlay every line of `other`; lines of `other` win on collision
    pub fn overlay(&mut self, other: &WriteBuffer) {
        for (time, line) in &other.lines {
            self.lines.insert(*time, line.clone());
        }
    }

    /// Number of distinct timestamps
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the buffer holds no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Drop every line
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Earliest and latest timestamp
    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let first = self.lines.keys().next()?;
        let last = self.lines.keys().next_back()?;
        Some((*first, *last))
    }

    /// Lines in timestamp order
    pub fn lines(&self) -> impl Iterator<Item = (&NaiveDateTime, &String)> {
        self.lines.iter()
    }

    /// Entry content: lines joined with `\n`, ascending by timestamp
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        for (i, line) in self.lines.values().enumerate() {
            if i > 0 {
                out.push_str(LINE_SEPARATOR);
            }
            out.push_str(line);
        }
        out.into_bytes()
    }

    /// Render `record` and insert it under the timestamp its line carries
    ///
    /// Records that render to the same stored timestamp (seconds dropped by a
    /// coarse line, for example) collapse into one line; the later one wins.
    pub fn push(&mut self, record: &Record, codec: &dyn LineCodec, granularity: Granularity) {
        let line = codec.render(record, granularity);
        let time = codec.parse_timestamp(&line, granularity).unwrap_or(record.time);
        self.insert(time, line);
    }

    /// Copy of this buffer keyed by the timestamps `codec` reads from each line
    ///
    /// Stored entries are loaded in this key space, so new data must be moved
    /// into it before the two are overlaid. Lines the codec cannot read keep
    /// their current key.
    pub fn rekeyed(&self, codec: &dyn LineCodec, granularity: Granularity) -> Self {
        let mut buffer = Self::new();
        for (time, line) in &self.lines {
            let key = codec.parse_timestamp(line, granularity).unwrap_or(*time);
            buffer.insert(key, line.clone());
        }
        buffer
    }

    /// Build a buffer from records rendered with `codec`
    pub fn from_records<'a, I>(records: I, codec: &dyn LineCodec, granularity: Granularity) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut buffer = Self::new();
        for record in records {
            buffer.push(record, codec, granularity);
        }
        buffer
    }
}
