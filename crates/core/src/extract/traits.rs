//! Trait definitions for the extraction engine.

use std::path::Path;

use async_trait::async_trait;

use super::error::ExtractionError;
use crate::cancel::CancelToken;
use crate::progress::ProgressSample;

/// What an extraction produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub entries: usize,
    pub bytes_read: u64,
}

/// Installs an archive into a target directory.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Returns the name of this extractor implementation.
    fn name(&self) -> &str;

    /// Unpacks `archive` and atomically replaces `target` with the result.
    ///
    /// On error or cancellation `target` is left exactly as it was and no
    /// staging data remains on disk.
    async fn install(
        &self,
        archive: &Path,
        target: &Path,
        on_progress: &(dyn Fn(ProgressSample) + Send + Sync),
        cancel: &CancelToken,
    ) -> Result<ExtractionSummary, ExtractionError>;
}
