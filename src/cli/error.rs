//! CLI error types and conversions

use crate::downloader::BulkError;
use crate::fetcher::FetcherError;
use crate::identifier::IdentifierError;
use crate::output::{ArchiveError, PathError, WriterError};

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Identifier error
    #[error("identifier error: {0}")]
    IdentifierError(#[from] IdentifierError),

    /// Path resolution error
    #[error("path error: {0}")]
    PathError(#[from] PathError),

    /// Streaming writer error
    #[error("write error: {0}")]
    WriterError(#[from] WriterError),

    /// Bulk pipeline error
    #[error("backfill error: {0}")]
    BulkError(#[from] BulkError),

    /// Fetcher error
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Archive error
    #[error("archive error: {0}")]
    ArchiveError(#[from] ArchiveError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Output could not be serialized
    #[error("serialization error: {0}")]
    SerializationError(String),
}
