//! HTTP download engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::checksum::Checksum;
use super::config::DownloaderConfig;
use super::error::DownloadError;
use super::traits::Downloader;
use crate::artifact::ArtifactDescriptor;
use crate::cancel::CancelToken;
use crate::metrics::{BYTES_DOWNLOADED, CHECKSUM_FAILURES};
use crate::progress::{ProgressSample, ProgressTracker};

/// Removes the partial download when dropped, unless kept.
struct PartialFile {
    path: PathBuf,
    keep: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn keep(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial download {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial download {:?}: {}", self.path, e),
        }
    }
}

/// Streams archives over HTTP(S) with reqwest.
pub struct HttpDownloader {
    client: Client,
    config: DownloaderConfig,
    temp_dir: PathBuf,
}

impl HttpDownloader {
    /// Creates a downloader writing partial files under `temp_dir`.
    pub fn new(config: DownloaderConfig, temp_dir: impl Into<PathBuf>) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| DownloadError::ClientSetup(e.to_string()))?;

        Ok(Self {
            client,
            config,
            temp_dir: temp_dir.into(),
        })
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    fn partial_path(&self, descriptor: &ArtifactDescriptor) -> PathBuf {
        let name = descriptor.archive_file_name().unwrap_or("archive");
        self.temp_dir
            .join(format!("{}-{}", Uuid::new_v4().simple(), name))
    }

    /// Streams the body into `path`, verifying the digest on completion.
    async fn fetch(
        &self,
        descriptor: &ArtifactDescriptor,
        checksum: &Checksum,
        path: &Path,
        on_progress: &(dyn Fn(ProgressSample) + Send + Sync),
        cancel: &CancelToken,
    ) -> Result<u64, DownloadError> {
        let url = descriptor.download_url.as_str();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Aborted),
            response = self.client.get(url).send() => {
                response.map_err(|e| DownloadError::network(url, e))?
            }
        };
        let response = response
            .error_for_status()
            .map_err(|e| DownloadError::network(url, e))?;

        let total = response
            .content_length()
            .filter(|len| *len > 0)
            .unwrap_or(descriptor.download_size_bytes);
        let mut tracker = ProgressTracker::new(total, self.config.tracker_settings());
        if let Some(sample) = tracker.record(0) {
            on_progress(sample);
        }

        let mut file = File::create(path).await?;
        let mut hasher = checksum.hasher();
        let mut stream = response.bytes_stream();
        let mut done = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(DownloadError::Aborted);
            }
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadError::Aborted),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| DownloadError::network(url, e))?;

            hasher.update(&chunk);
            file.write_all(&chunk).await?;
            done += chunk.len() as u64;
            BYTES_DOWNLOADED.inc_by(chunk.len() as u64);

            if let Some(sample) = tracker.record(done) {
                on_progress(sample);
            }
        }
        file.flush().await?;
        drop(file);

        let actual = hasher.finalize_hex();
        if !checksum.matches(&actual) {
            CHECKSUM_FAILURES.inc();
            return Err(DownloadError::ChecksumMismatch {
                expected: checksum.hex().to_string(),
                actual,
            });
        }

        if done > tracker.total() {
            tracker.set_total(done);
        }
        on_progress(tracker.finish());
        Ok(done)
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    fn name(&self) -> &str {
        "http"
    }

    async fn download(
        &self,
        descriptor: &ArtifactDescriptor,
        on_progress: &(dyn Fn(ProgressSample) + Send + Sync),
        cancel: &CancelToken,
    ) -> Result<PathBuf, DownloadError> {
        let checksum: Checksum = descriptor.checksum.parse()?;
        fs::create_dir_all(&self.temp_dir).await?;

        let partial = PartialFile::new(self.partial_path(descriptor));
        info!(
            "Downloading {} from {} to {:?}",
            descriptor.id, descriptor.download_url, partial.path
        );

        let bytes = self
            .fetch(descriptor, &checksum, &partial.path, on_progress, cancel)
            .await?;

        info!(
            "Downloaded {} ({} bytes, {} verified)",
            descriptor.id,
            bytes,
            checksum.algorithm().as_str()
        );
        Ok(partial.keep())
    }
}
