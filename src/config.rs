//! Archive defaults and writer settings

use crate::{DataKind, Granularity};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default data root directory
pub const DEFAULT_DATA_DIR: &str = "data";

/// Timezone records are written in unless configured otherwise.
/// Archives written for US markets use exchange-local wall time.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::New_York;

/// Extension of archive files
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Extension of entries inside an archive
pub const ENTRY_EXTENSION: &str = "csv";

/// Date format used in archive and entry names (`yyyyMMdd`)
pub const DATE_FORMAT: &str = "%Y%m%d";

/// Leading timestamp of coarse (hour/daily) lines (`yyyyMMdd HH:mm`)
pub const COARSE_TIME_FORMAT: &str = "%Y%m%d %H:%M";

/// Width of the coarse timestamp field in characters
pub const COARSE_TIME_WIDTH: usize = 14;

/// Separator between lines of an entry
pub const LINE_SEPARATOR: &str = "\n";

/// Settings shared by the streaming writer and the bulk pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterSettings {
    /// Root directory all archive paths are relative to
    pub data_dir: PathBuf,
    /// Storage granularity
    pub granularity: Granularity,
    /// Data kind
    pub kind: DataKind,
    /// Timezone record times are expressed in
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
}

fn default_timezone() -> Tz {
    DEFAULT_TIMEZONE
}

impl WriterSettings {
    /// Create settings for minute trade data under `data_dir`
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            granularity: Granularity::Minute,
            kind: DataKind::Trade,
            timezone: DEFAULT_TIMEZONE,
        }
    }

    /// Set granularity
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Set data kind
    pub fn with_kind(mut self, kind: DataKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set display timezone
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}
