//! Mock downloader for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::fixtures;
use crate::artifact::ArtifactDescriptor;
use crate::cancel::CancelToken;
use crate::download::{Checksum, DownloadError, Downloader};
use crate::progress::{ProgressSample, ProgressTracker, TrackerSettings};

/// Mock implementation of the Downloader trait.
///
/// Serves archives from memory in a configurable number of chunks with a
/// delay between them, so tests can observe progress and abort mid-transfer:
/// - Serves [`fixtures::runtime_archive`] unless an archive was registered
/// - Verifies the descriptor checksum like the real engine
/// - Records every requested id
#[derive(Debug)]
pub struct MockDownloader {
    temp_dir: PathBuf,
    archives: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    chunks: Arc<RwLock<usize>>,
    chunk_delay_ms: Arc<RwLock<u64>>,
    next_error: Arc<RwLock<Option<DownloadError>>>,
    downloads: Arc<RwLock<Vec<String>>>,
}

impl MockDownloader {
    /// Create a mock writing its archives under `temp_dir`.
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            archives: Arc::new(RwLock::new(HashMap::new())),
            chunks: Arc::new(RwLock::new(10)),
            chunk_delay_ms: Arc::new(RwLock::new(5)),
            next_error: Arc::new(RwLock::new(None)),
            downloads: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Serve `bytes` for `id` instead of the fixture archive.
    pub async fn set_archive(&self, id: &str, bytes: Vec<u8>) {
        self.archives.write().await.insert(id.to_string(), bytes);
    }

    /// Split transfers into `chunks` pieces, sleeping `delay` before each.
    pub async fn set_chunking(&self, chunks: usize, delay: Duration) {
        *self.chunks.write().await = chunks.max(1);
        *self.chunk_delay_ms.write().await = delay.as_millis() as u64;
    }

    /// Fail the next download with `error` before any bytes are written.
    pub async fn set_next_error(&self, error: DownloadError) {
        *self.next_error.write().await = Some(error);
    }

    /// Ids requested so far, in order.
    pub async fn recorded_downloads(&self) -> Vec<String> {
        self.downloads.read().await.clone()
    }

    pub async fn download_count(&self) -> usize {
        self.downloads.read().await.len()
    }

    async fn write_chunks(
        &self,
        path: &Path,
        bytes: &[u8],
        on_progress: &(dyn Fn(ProgressSample) + Send + Sync),
        cancel: &CancelToken,
    ) -> Result<(), DownloadError> {
        let chunks = *self.chunks.read().await;
        let delay = Duration::from_millis(*self.chunk_delay_ms.read().await);
        let mut tracker = ProgressTracker::new(
            bytes.len() as u64,
            TrackerSettings {
                min_interval: Duration::ZERO,
                min_delta_pct: 0.0,
                smoothing: 0.5,
            },
        );

        let mut file = File::create(path).await?;
        let mut done = 0u64;
        for chunk in bytes.chunks(bytes.len().div_ceil(chunks).max(1)) {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadError::Aborted),
                _ = tokio::time::sleep(delay) => {}
            }
            file.write_all(chunk).await?;
            done += chunk.len() as u64;
            if let Some(sample) = tracker.record(done) {
                on_progress(sample);
            }
        }
        file.flush().await?;
        on_progress(tracker.finish());
        Ok(())
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    fn name(&self) -> &str {
        "mock"
    }

    async fn download(
        &self,
        descriptor: &ArtifactDescriptor,
        on_progress: &(dyn Fn(ProgressSample) + Send + Sync),
        cancel: &CancelToken,
    ) -> Result<PathBuf, DownloadError> {
        self.downloads.write().await.push(descriptor.id.clone());

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let expected: Checksum = descriptor.checksum.parse()?;
        let bytes = self
            .archives
            .read()
            .await
            .get(&descriptor.id)
            .cloned()
            .unwrap_or_else(|| fixtures::runtime_archive(&descriptor.id));

        fs::create_dir_all(&self.temp_dir).await?;
        let path = self.temp_dir.join(format!(
            "{}-{}",
            Uuid::new_v4().simple(),
            descriptor.archive_file_name().unwrap_or("archive.tar.gz")
        ));

        let written = self.write_chunks(&path, &bytes, on_progress, cancel).await;
        let verified = written.and_then(|()| {
            let actual = Checksum::compute(expected.algorithm(), &bytes);
            if expected.matches(actual.hex()) {
                Ok(())
            } else {
                Err(DownloadError::ChecksumMismatch {
                    expected: expected.hex().to_string(),
                    actual: actual.hex().to_string(),
                })
            }
        });

        match verified {
            Ok(()) => Ok(path),
            Err(e) => {
                let _ = fs::remove_file(&path).await;
                Err(e)
            }
        }
    }
}
