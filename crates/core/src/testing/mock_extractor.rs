//! Mock extractor for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::cancel::CancelToken;
use crate::extract::{ExtractionError, ExtractionSummary, Extractor};
use crate::progress::ProgressSample;

/// Name of the file the mock writes into every target it installs.
pub const MOCK_MARKER: &str = "MOCK_INSTALLED";

/// Mock implementation of the Extractor trait.
///
/// Walks through a configurable number of steps, reporting progress and
/// checking for cancellation at each, then replaces the target with a
/// directory holding a single marker file.
#[derive(Debug)]
pub struct MockExtractor {
    installs: Arc<RwLock<Vec<PathBuf>>>,
    steps: Arc<RwLock<usize>>,
    step_delay_ms: Arc<RwLock<u64>>,
    next_error: Arc<RwLock<Option<ExtractionError>>>,
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExtractor {
    pub fn new() -> Self {
        Self {
            installs: Arc::new(RwLock::new(Vec::new())),
            steps: Arc::new(RwLock::new(5)),
            step_delay_ms: Arc::new(RwLock::new(5)),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Targets installed so far.
    pub async fn recorded_installs(&self) -> Vec<PathBuf> {
        self.installs.read().await.clone()
    }

    pub async fn set_steps(&self, steps: usize, delay: Duration) {
        *self.steps.write().await = steps.max(1);
        *self.step_delay_ms.write().await = delay.as_millis() as u64;
    }

    /// Fail the next install with `error` after all steps ran.
    pub async fn set_next_error(&self, error: ExtractionError) {
        *self.next_error.write().await = Some(error);
    }

    pub fn marker(target: &Path) -> PathBuf {
        target.join(MOCK_MARKER)
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn install(
        &self,
        archive: &Path,
        target: &Path,
        on_progress: &(dyn Fn(ProgressSample) + Send + Sync),
        cancel: &CancelToken,
    ) -> Result<ExtractionSummary, ExtractionError> {
        let steps = *self.steps.read().await;
        let delay = Duration::from_millis(*self.step_delay_ms.read().await);

        for step in 1..=steps {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExtractionError::Aborted),
                _ = tokio::time::sleep(delay) => {}
            }
            let remaining = delay * (steps - step) as u32;
            on_progress(ProgressSample::new(
                step as f64 / steps as f64 * 100.0,
                0.0,
                remaining,
            ));
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        if tokio::fs::symlink_metadata(target).await.is_ok() {
            tokio::fs::remove_dir_all(target)
                .await
                .map_err(|e| ExtractionError::io(target, e))?;
        }
        tokio::fs::create_dir_all(target)
            .await
            .map_err(|e| ExtractionError::io(target, e))?;
        tokio::fs::write(Self::marker(target), archive.to_string_lossy().as_bytes())
            .await
            .map_err(|e| ExtractionError::io(target, e))?;

        self.installs.write().await.push(target.to_path_buf());
        let bytes_read = tokio::fs::metadata(archive)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        Ok(ExtractionSummary {
            entries: steps,
            bytes_read,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_installs_marker() {
        let temp = TempDir::new().unwrap();
        let extractor = MockExtractor::new();
        let target = temp.path().join("GE-Proton8-1");

        extractor
            .install(Path::new("/tmp/a.tar.gz"), &target, &|_| {}, &CancelToken::new())
            .await
            .unwrap();

        assert!(MockExtractor::marker(&target).is_file());
        assert_eq!(extractor.recorded_installs().await, vec![target]);
    }

    #[tokio::test]
    async fn test_cancel_and_error() {
        let temp = TempDir::new().unwrap();
        let extractor = MockExtractor::new();
        let target = temp.path().join("x");

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = extractor
            .install(Path::new("a.tar.gz"), &target, &|_| {}, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_aborted());

        extractor
            .set_next_error(ExtractionError::Malformed("bad".to_string()))
            .await;
        let err = extractor
            .install(Path::new("a.tar.gz"), &target, &|_| {}, &CancelToken::new())
            .await
            .unwrap_err();
        assert!(err.is_malformed());
        assert!(!target.exists());
    }
}
