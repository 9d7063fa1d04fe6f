//! Read-modify-write of a single archive entry
//!
//! The engine loads the target archive, computes the new content of one entry
//! and saves the whole archive through [`ArchiveFile::save`], which stages to a
//! temporary file and renames it into place.
//!
//! Coarse entries are merged line by line: every stored line is keyed by its
//! leading timestamp, new lines overlay old ones and the union is written back
//! in ascending order. When any stored line cannot be parsed the merge is
//! abandoned and the new data replaces the entry.

use super::archive::ArchiveFile;
use super::path::StorageMode;
use super::{LineCodec, OutputResult, WriteBuffer};
use crate::metrics::{self, ArchiveWriteMetrics};
use crate::Granularity;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to the target entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryChange {
    /// Entry did not exist before
    Created,
    /// Existing lines were merged with the new ones
    Merged,
    /// Existing entry was overwritten by the new data
    Replaced,
}

impl EntryChange {
    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryChange::Created => "created",
            EntryChange::Merged => "merged",
            EntryChange::Replaced => "replaced",
        }
    }
}

impl fmt::Display for EntryChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of writing one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// What happened to the entry
    pub change: EntryChange,
    /// Lines in the entry after the write
    pub lines: usize,
}

/// Writes entries of zip archives, merging where the storage mode allows
#[derive(Clone)]
pub struct ArchiveMergeEngine {
    codec: Arc<dyn LineCodec>,
    granularity: Granularity,
}

impl fmt::Debug for ArchiveMergeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveMergeEngine")
            .field("granularity", &self.granularity)
            .finish_non_exhaustive()
    }
}

impl ArchiveMergeEngine {
    /// Create an engine reading stored timestamps with `codec`
    pub fn new(codec: Arc<dyn LineCodec>, granularity: Granularity) -> Self {
        Self { codec, granularity }
    }

    /// Granularity of the entries this engine writes
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Line codec
    pub fn codec(&self) -> &dyn LineCodec {
        self.codec.as_ref()
    }

    /// Write `data` into entry `entry` of the archive at `path` using `mode`
    pub fn write(
        &self,
        path: &Path,
        entry: &str,
        data: &WriteBuffer,
        mode: StorageMode,
    ) -> OutputResult<WriteOutcome> {
        match mode {
            StorageMode::CoarseMergeable => self.merge_write(path, entry, data, true),
            StorageMode::AppendMergeable => self.merge_write(path, entry, data, false),
            StorageMode::ReplaceOnly => self.replace_write(path, entry, data),
        }
    }

    /// Write one entry, keeping every other entry of the archive
    ///
    /// With `mergeable` set, an existing loadable entry is merged with `data`
    /// by timestamp (new lines win). Otherwise, or when the archive or entry
    /// is missing or unreadable, `data` becomes the whole entry.
    pub fn merge_write(
        &self,
        path: &Path,
        entry: &str,
        data: &WriteBuffer,
        mergeable: bool,
    ) -> OutputResult<WriteOutcome> {
        let metrics = ArchiveWriteMetrics::start(if mergeable { "merge" } else { "append" });

        let mut archive = ArchiveFile::open_or_empty(path)?;
        let outcome = self.merge_into(&mut archive, entry, data, mergeable);
        archive.save()?;

        metrics.record_success(outcome.change.as_str(), outcome.lines);
        info!(
            path = %path.display(),
            entry = entry,
            lines = outcome.lines,
            change = %outcome.change,
            "Archive entry written"
        );
        Ok(outcome)
    }

    /// Write `data` as the only entry of a fresh archive at `path`
    ///
    /// Whatever was stored at `path` is discarded when the new archive is
    /// renamed over it.
    pub fn replace_write(
        &self,
        path: &Path,
        entry: &str,
        data: &WriteBuffer,
    ) -> OutputResult<WriteOutcome> {
        let metrics = ArchiveWriteMetrics::start("replace");
        let existed = path.exists();

        let data = data.rekeyed(self.codec(), self.granularity);
        let mut archive = ArchiveFile::empty(path);
        archive.set_entry(entry, data.to_bytes());
        archive.save()?;

        let outcome = WriteOutcome {
            change: if existed {
                EntryChange::Replaced
            } else {
                EntryChange::Created
            },
            lines: data.len(),
        };
        metrics.record_success(outcome.change.as_str(), outcome.lines);
        info!(
            path = %path.display(),
            entry = entry,
            lines = outcome.lines,
            change = %outcome.change,
            "Archive replaced"
        );
        Ok(outcome)
    }

    /// Apply `data` to entry `entry` of an in-memory archive
    ///
    /// Nothing is written to disk; the caller saves the archive. `data` is
    /// keyed by the timestamps the codec reads back from its lines, the same
    /// keys stored lines are loaded under.
    pub fn merge_into(
        &self,
        archive: &mut ArchiveFile,
        entry: &str,
        data: &WriteBuffer,
        mergeable: bool,
    ) -> WriteOutcome {
        let data = &data.rekeyed(self.codec(), self.granularity);
        let (content, change) = match archive.entry(entry) {
            None => (data.clone(), EntryChange::Created),
            Some(_) if !mergeable => (data.clone(), EntryChange::Replaced),
            Some(bytes) => match self.load_entry(bytes) {
                Some(mut existing) => {
                    debug!(
                        entry = entry,
                        existing = existing.len(),
                        new = data.len(),
                        "Merging entry"
                    );
                    existing.overlay(data);
                    (existing, EntryChange::Merged)
                }
                None => {
                    warn!(
                        path = %archive.path().display(),
                        entry = entry,
                        "Existing entry has unparsable lines, replacing it"
                    );
                    metrics::record_merge_fallback();
                    (data.clone(), EntryChange::Replaced)
                }
            },
        };

        let lines = content.len();
        archive.set_entry(entry, content.to_bytes());
        WriteOutcome { change, lines }
    }

    /// Parse stored entry bytes back into a buffer
    ///
    /// Returns `None` if the content is not UTF-8 or any line has no
    /// parsable timestamp. Blank lines are ignored.
    fn load_entry(&self, bytes: &[u8]) -> Option<WriteBuffer> {
        let text = std::str::from_utf8(bytes).ok()?;
        let mut buffer = WriteBuffer::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let time = self.codec.parse_timestamp(line, self.granularity)?;
            buffer.insert(time, line.to_string());
        }
        Some(buffer)
    }
}
