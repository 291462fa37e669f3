//! Trait definitions for the download engine.

use std::path::PathBuf;

use async_trait::async_trait;

use super::error::DownloadError;
use crate::artifact::ArtifactDescriptor;
use crate::cancel::CancelToken;
use crate::progress::ProgressSample;

/// Fetches an artifact archive to a local temporary file.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Returns the name of this downloader implementation.
    fn name(&self) -> &str;

    /// Downloads and verifies the archive for `descriptor`.
    ///
    /// On success the returned file belongs to the caller. On any error,
    /// including [`DownloadError::Aborted`], no file is left behind.
    async fn download(
        &self,
        descriptor: &ArtifactDescriptor,
        on_progress: &(dyn Fn(ProgressSample) + Send + Sync),
        cancel: &CancelToken,
    ) -> Result<PathBuf, DownloadError>;
}
