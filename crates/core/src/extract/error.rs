//! Error types for the extraction engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while installing an archive.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The archive is corrupt, empty, or contains unsafe entries.
    #[error("Malformed archive: {0}")]
    Malformed(String),

    /// The archive format is not one we can unpack.
    #[error("Unsupported archive format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// Writing to the filesystem failed.
    #[error("I/O failure at {path}: {source}")]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Extraction was cancelled.
    #[error("Extraction aborted")]
    Aborted,
}

impl ExtractionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoFailure {
            path: path.into(),
            source,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Malformed data is never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::IoFailure { .. })
    }

    /// Whether the error belongs to the "bad archive" class.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::UnsupportedFormat { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) | Self::UnsupportedFormat { .. } => "malformed",
            Self::IoFailure { .. } => "io_failure",
            Self::Aborted => "aborted",
        }
    }
}
