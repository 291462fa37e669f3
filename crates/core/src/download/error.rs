//! Error types for the download engine.

use thiserror::Error;

/// Errors that can occur while fetching an artifact archive.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The remote could not be reached or answered with an error.
    #[error("Network failure fetching {url}: {reason}")]
    NetworkFailure { url: String, reason: String },

    /// The fetched bytes do not match the catalog checksum.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// The catalog checksum could not be parsed.
    #[error("Invalid checksum: {0}")]
    InvalidChecksum(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),

    /// Writing the temporary file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The download was cancelled.
    #[error("Download aborted")]
    Aborted,
}

impl DownloadError {
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::NetworkFailure {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Whether calling again may succeed. Corrupt data is never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure { .. } | Self::Io(_))
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NetworkFailure { .. } => "network_failure",
            Self::ChecksumMismatch { .. } => "checksum_mismatch",
            Self::InvalidChecksum(_) => "invalid_checksum",
            Self::ClientSetup(_) => "client_setup",
            Self::Io(_) => "io",
            Self::Aborted => "aborted",
        }
    }
}
