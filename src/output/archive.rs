//! Zip archive images with atomic staged saves
//!
//! An [`ArchiveFile`] is the full in-memory content of one archive: entry name
//! to entry bytes. Saving never writes the final path directly. The image is
//! written to a temporary file in the same directory, synced, then renamed over
//! the final path, so a reader sees either the old archive or the new one.

use super::{ArchiveError, OutputResult};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::result::ZipError;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// In-memory image of a zip archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    path: PathBuf,
    entries: BTreeMap<String, Vec<u8>>,
}

impl ArchiveFile {
    /// Image of a new archive at `path` with no entries
    pub fn empty<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Read the archive at `path`
    ///
    /// Returns `Ok(None)` when no file exists. A file that cannot be read is
    /// an [`ArchiveError::IoError`]; a readable file that is not a valid zip
    /// archive is an [`ArchiveError::ZipError`].
    pub fn open(path: &Path) -> OutputResult<Option<Self>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ArchiveError::IoError(format!("{}: {e}", path.display()))),
        };
        let metadata = file
            .metadata()
            .map_err(|e| ArchiveError::IoError(format!("{}: {e}", path.display())))?;
        if metadata.is_dir() {
            return Err(ArchiveError::IoError(format!(
                "{}: is a directory",
                path.display()
            )));
        }

        let mut zip = ZipArchive::new(file).map_err(|e| zip_error(path, e))?;

        let mut entries = BTreeMap::new();
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).map_err(|e| zip_error(path, e))?;
            if entry.is_dir() {
                continue;
            }
            // Header sizes are untrusted; let the reader grow the buffer
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).map_err(|e| {
                let message = format!("{}: {}: {e}", path.display(), entry.name());
                if e.kind() == std::io::ErrorKind::InvalidData {
                    ArchiveError::ZipError(message)
                } else {
                    ArchiveError::IoError(message)
                }
            })?;
            entries.insert(entry.name().to_string(), bytes);
        }

        debug!(path = %path.display(), entries = entries.len(), "Read archive");
        Ok(Some(Self {
            path: path.to_path_buf(),
            entries,
        }))
    }

    /// Read the archive at `path`, starting fresh when it is missing or corrupt
    ///
    /// A corrupt container is logged and treated as empty; the next save
    /// replaces it. I/O failures are returned, since saving over an archive
    /// that could not be read would drop its other entries.
    pub fn open_or_empty(path: &Path) -> OutputResult<Self> {
        match Self::open(path) {
            Ok(Some(archive)) => Ok(archive),
            Ok(None) => Ok(Self::empty(path)),
            Err(ArchiveError::ZipError(e)) => {
                warn!(path = %path.display(), error = %e, "Corrupt archive, rebuilding");
                Ok(Self::empty(path))
            }
            Err(e) => Err(e),
        }
    }

    /// Final path of this archive
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Content of entry `name`
    pub fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Insert or replace entry `name`
    pub fn set_entry(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(name.into(), bytes);
    }

    /// Remove entry `name`, returning its content
    pub fn remove_entry(&mut self, name: &str) -> Option<Vec<u8>> {
        self.entries.remove(name)
    }

    /// Entry names in ascending order
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the image to a temporary file next to the final path
    ///
    /// Nothing at the final path changes until [`StagedArchive::commit`]. The
    /// temporary file is removed if the staged archive is dropped.
    pub fn stage(&self) -> OutputResult<StagedArchive> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)
            .map_err(|e| ArchiveError::IoError(format!("{}: {e}", parent.display())))?;

        let mut temp_file = NamedTempFile::new_in(&parent)
            .map_err(|e| ArchiveError::IoError(format!("Failed to create temp file: {e}")))?;

        // Fixed timestamps keep archive bytes a pure function of the entries
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        {
            let mut zip = ZipWriter::new(temp_file.as_file_mut());
            for (name, bytes) in &self.entries {
                zip.start_file(name.as_str(), options)
                    .map_err(|e| ArchiveError::ZipError(e.to_string()))?;
                zip.write_all(bytes)
                    .map_err(|e| ArchiveError::IoError(e.to_string()))?;
            }
            zip.finish()
                .map_err(|e| ArchiveError::ZipError(e.to_string()))?;
        }

        temp_file
            .flush()
            .map_err(|e| ArchiveError::IoError(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| ArchiveError::IoError(format!("Failed to sync temp file: {e}")))?;

        Ok(StagedArchive {
            temp_file,
            path: self.path.clone(),
            parent,
            entries: self.entries.len(),
        })
    }

    /// Stage and commit in one step
    pub fn save(&self) -> OutputResult<()> {
        self.stage()?.commit()
    }
}

/// I/O failures stay I/O errors; truncated or malformed data means a corrupt container
fn zip_error(path: &Path, err: ZipError) -> ArchiveError {
    match err {
        ZipError::Io(e)
            if !matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::InvalidData
            ) =>
        {
            ArchiveError::IoError(format!("{}: {e}", path.display()))
        }
        other => ArchiveError::ZipError(format!("{}: {other}", path.display())),
    }
}

/// Archive written to a temporary file, waiting to replace the final path
#[derive(Debug)]
pub struct StagedArchive {
    temp_file: NamedTempFile,
    path: PathBuf,
    parent: PathBuf,
    entries: usize,
}

impl StagedArchive {
    /// Path the archive will be committed to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replace the final path with the staged archive
    pub fn commit(self) -> OutputResult<()> {
        self.temp_file
            .persist(&self.path)
            .map_err(|e| ArchiveError::PersistError(format!("{}: {e}", self.path.display())))?;

        // Fsync the directory so the rename itself is durable
        File::open(&self.parent)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| {
                ArchiveError::IoError(format!(
                    "failed to sync directory {}: {e}",
                    self.parent.display()
                ))
            })?;

        debug!(path = %self.path.display(), entries = self.entries, "Archive saved");
        Ok(())
    }
}
