//! Tar archive extractor with staged, rename-based installation.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::read::GzDecoder;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use xz2::read::XzDecoder;

use super::config::ExtractorConfig;
use super::error::ExtractionError;
use super::traits::{ExtractionSummary, Extractor};
use crate::cancel::CancelToken;
use crate::progress::{ProgressSample, ProgressTracker, TrackerSettings};

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];
const USTAR_OFFSET: usize = 257;

/// Archive container formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarXz,
    Tar,
}

impl ArchiveFormat {
    /// Detects the format from a file name extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar.xz") || lower.ends_with(".txz") {
            Some(Self::TarXz)
        } else if lower.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }

    /// Detects the format from the first bytes of the archive.
    pub fn sniff(header: &[u8]) -> Option<Self> {
        if header.starts_with(GZIP_MAGIC) {
            Some(Self::TarGz)
        } else if header.starts_with(XZ_MAGIC) {
            Some(Self::TarXz)
        } else if header.get(USTAR_OFFSET..USTAR_OFFSET + 5) == Some(b"ustar".as_slice()) {
            Some(Self::Tar)
        } else {
            None
        }
    }

    /// Uses the file name when it is conclusive, the magic bytes otherwise.
    pub fn detect(path: &Path) -> Result<Self, ExtractionError> {
        if let Some(format) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(Self::from_file_name)
        {
            return Ok(format);
        }

        let mut file = File::open(path).map_err(|e| ExtractionError::io(path, e))?;
        let mut header = [0u8; 512];
        let mut filled = 0;
        while filled < header.len() {
            match file.read(&mut header[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(ExtractionError::io(path, e)),
            }
        }

        Self::sniff(&header[..filled]).ok_or_else(|| ExtractionError::UnsupportedFormat {
            path: path.to_path_buf(),
        })
    }
}

/// Counts compressed bytes for progress and fails reads once cancelled.
struct ProgressReader<'a, R> {
    inner: R,
    read: u64,
    tracker: ProgressTracker,
    report: &'a dyn Fn(ProgressSample),
    cancel: &'a CancelToken,
}

impl<R: Read> Read for ProgressReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::other("extraction cancelled"));
        }
        let n = self.inner.read(buf)?;
        self.read += n as u64;
        if let Some(sample) = self.tracker.record(self.read) {
            (self.report)(sample);
        }
        Ok(n)
    }
}

/// Removes the staging directory on every exit path.
struct StagingDir {
    path: PathBuf,
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed staging directory {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staging directory {:?}: {}", self.path, e),
        }
    }
}

/// A single blocking install, run on the blocking thread pool.
struct UnpackJob {
    archive: PathBuf,
    target: PathBuf,
    strip_single_root: bool,
    settings: TrackerSettings,
    cancel: CancelToken,
}

impl UnpackJob {
    fn run(self, report: &dyn Fn(ProgressSample)) -> Result<ExtractionSummary, ExtractionError> {
        let format = ArchiveFormat::detect(&self.archive)?;

        let (parent, name) = match (self.target.parent(), self.target.file_name()) {
            (Some(parent), Some(name)) => (parent.to_path_buf(), name.to_string_lossy().into_owned()),
            _ => {
                return Err(ExtractionError::io(
                    &self.target,
                    io::Error::new(io::ErrorKind::InvalidInput, "target has no parent directory"),
                ))
            }
        };
        fs::create_dir_all(&parent).map_err(|e| ExtractionError::io(&parent, e))?;

        let staging = StagingDir {
            path: parent.join(format!(".{}.staging-{}", name, Uuid::new_v4().simple())),
        };
        fs::create_dir(&staging.path).map_err(|e| ExtractionError::io(&staging.path, e))?;
        debug!("Staging {:?} into {:?}", self.archive, staging.path);

        let file = File::open(&self.archive).map_err(|e| ExtractionError::io(&self.archive, e))?;
        let total = file
            .metadata()
            .map_err(|e| ExtractionError::io(&self.archive, e))?
            .len();
        let mut reader = ProgressReader {
            inner: BufReader::new(file),
            read: 0,
            tracker: ProgressTracker::new(total, self.settings),
            report,
            cancel: &self.cancel,
        };

        let entries = {
            let decoded: Box<dyn Read + '_> = match format {
                ArchiveFormat::TarGz => Box::new(GzDecoder::new(&mut reader)),
                ArchiveFormat::TarXz => Box::new(XzDecoder::new(&mut reader)),
                ArchiveFormat::Tar => Box::new(&mut reader),
            };
            unpack_entries(decoded, &staging.path, &self.cancel)?
        };

        if self.cancel.is_cancelled() {
            return Err(ExtractionError::Aborted);
        }

        let content = content_root(&staging.path, self.strip_single_root)
            .map_err(|e| ExtractionError::io(&staging.path, e))?;
        swap_into_place(&content, &self.target, &parent, &name)?;

        let bytes_read = reader.read;
        if bytes_read > reader.tracker.total() {
            reader.tracker.set_total(bytes_read);
        }
        report(reader.tracker.finish());

        Ok(ExtractionSummary {
            entries,
            bytes_read,
        })
    }
}

fn unpack_entries(
    reader: impl Read,
    staging: &Path,
    cancel: &CancelToken,
) -> Result<usize, ExtractionError> {
    let mut archive = tar::Archive::new(reader);
    archive.set_overwrite(true);
    archive.set_preserve_mtime(true);

    let read_error = |e: io::Error| {
        if cancel.is_cancelled() {
            ExtractionError::Aborted
        } else {
            ExtractionError::Malformed(e.to_string())
        }
    };

    let mut count = 0;
    for entry in archive.entries().map_err(read_error)? {
        if cancel.is_cancelled() {
            return Err(ExtractionError::Aborted);
        }
        let mut entry = entry.map_err(read_error)?;
        let path = entry
            .path()
            .map_err(|e| ExtractionError::Malformed(format!("invalid entry path: {}", e)))?
            .into_owned();

        let unpacked = entry.unpack_in(staging).map_err(|e| {
            if cancel.is_cancelled() {
                ExtractionError::Aborted
            } else if matches!(
                e.kind(),
                io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof
            ) {
                ExtractionError::Malformed(e.to_string())
            } else {
                ExtractionError::io(staging.join(&path), e)
            }
        })?;
        if !unpacked {
            return Err(ExtractionError::Malformed(format!(
                "entry {} escapes the archive root",
                path.display()
            )));
        }
        count += 1;
    }

    if count == 0 {
        return Err(ExtractionError::Malformed("archive has no entries".to_string()));
    }
    Ok(count)
}

/// The lone top-level directory when stripping applies, else the staging dir.
fn content_root(staging: &Path, strip_single_root: bool) -> io::Result<PathBuf> {
    if !strip_single_root {
        return Ok(staging.to_path_buf());
    }
    let mut entries = fs::read_dir(staging)?;
    match (entries.next().transpose()?, entries.next()) {
        (Some(only), None) if only.file_type()?.is_dir() => Ok(only.path()),
        _ => Ok(staging.to_path_buf()),
    }
}

fn remove_path(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Moves `content` to `target`, parking any previous install until the new
/// one is in place.
fn swap_into_place(
    content: &Path,
    target: &Path,
    parent: &Path,
    name: &str,
) -> Result<(), ExtractionError> {
    let previous = if fs::symlink_metadata(target).is_ok() {
        let parked = parent.join(format!(".{}.old-{}", name, Uuid::new_v4().simple()));
        fs::rename(target, &parked).map_err(|e| ExtractionError::io(target, e))?;
        Some(parked)
    } else {
        None
    };

    if let Err(e) = fs::rename(content, target) {
        if let Some(parked) = &previous {
            if let Err(restore) = fs::rename(parked, target) {
                error!(
                    "Failed to restore previous install {:?} from {:?}: {}",
                    target, parked, restore
                );
            }
        }
        return Err(ExtractionError::io(target, e));
    }

    if let Some(parked) = previous {
        if let Err(e) = remove_path(&parked) {
            warn!("Failed to remove previous install {:?}: {}", parked, e);
        }
    }
    Ok(())
}

/// Extracts tar archives on the blocking thread pool.
pub struct ArchiveExtractor {
    config: ExtractorConfig,
}

impl ArchiveExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

#[async_trait]
impl Extractor for ArchiveExtractor {
    fn name(&self) -> &str {
        "archive"
    }

    async fn install(
        &self,
        archive: &Path,
        target: &Path,
        on_progress: &(dyn Fn(ProgressSample) + Send + Sync),
        cancel: &CancelToken,
    ) -> Result<ExtractionSummary, ExtractionError> {
        info!("Extracting {:?} into {:?}", archive, target);

        let job = UnpackJob {
            archive: archive.to_path_buf(),
            target: target.to_path_buf(),
            strip_single_root: self.config.strip_single_root,
            settings: self.config.tracker_settings(),
            cancel: cancel.clone(),
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = tokio::task::spawn_blocking(move || {
            let report = |sample: ProgressSample| {
                let _ = tx.send(sample);
            };
            job.run(&report)
        });

        let joined = loop {
            tokio::select! {
                Some(sample) = rx.recv() => on_progress(sample),
                joined = &mut handle => break joined,
            }
        };
        while let Ok(sample) = rx.try_recv() {
            on_progress(sample);
        }

        let summary = joined
            .map_err(|e| ExtractionError::io(target, io::Error::other(e.to_string())))??;
        info!(
            "Extracted {} entries into {:?}",
            summary.entries, target
        );
        Ok(summary)
    }
}

fn is_leftover(name: &str) -> bool {
    name.starts_with('.') && (name.contains(".staging-") || name.contains(".old-"))
}

/// Removes staging and parked directories left behind by a crashed process.
pub async fn sweep_leftovers(root: &Path) -> io::Result<usize> {
    let mut dir = match tokio::fs::read_dir(root).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    while let Some(entry) = dir.next_entry().await? {
        let name = entry.file_name();
        if !is_leftover(&name.to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        let result = if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        match result {
            Ok(()) => {
                info!("Removed leftover {:?}", path);
                removed += 1;
            }
            Err(e) => warn!("Failed to remove leftover {:?}: {}", path, e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    const PROTON: &[(&str, &[u8])] = &[
        ("GE-Proton8-1/bin/wine", b"#!/bin/sh\necho wine\n".as_slice()),
        ("GE-Proton8-1/share/version", b"GE-Proton8-1".as_slice()),
    ];

    fn extractor() -> ArchiveExtractor {
        ArchiveExtractor::new(
            ExtractorConfig::default().with_progress_interval(Duration::from_millis(1)),
        )
    }

    fn write_archive(temp: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = temp.path().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    fn hidden_entries(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with('.'))
            .collect()
    }

    fn tar_xz_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        let mut builder = tar::Builder::new(encoder);
        for (path, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_format_from_file_name() {
        assert_eq!(ArchiveFormat::from_file_name("GE-Proton8-1.tar.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_file_name("lutris.TGZ"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_file_name("wine-ge.tar.xz"), Some(ArchiveFormat::TarXz));
        assert_eq!(ArchiveFormat::from_file_name("plain.tar"), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::from_file_name("build.zip"), None);
    }

    #[test]
    fn test_sniff_magic() {
        assert_eq!(ArchiveFormat::sniff(&[0x1f, 0x8b, 0x08]), Some(ArchiveFormat::TarGz));
        assert_eq!(
            ArchiveFormat::sniff(&[0xfd, b'7', b'z', b'X', b'Z', 0x00, 0x00]),
            Some(ArchiveFormat::TarXz)
        );
        let mut tar_header = vec![0u8; 512];
        tar_header[257..262].copy_from_slice(b"ustar");
        assert_eq!(ArchiveFormat::sniff(&tar_header), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::sniff(b"PK\x03\x04"), None);
    }

    #[tokio::test]
    async fn test_fresh_install_strips_single_root() {
        let temp = TempDir::new().unwrap();
        let archive = write_archive(&temp, "GE-Proton8-1.tar.gz", &fixtures::tar_gz_archive(PROTON));
        let target = temp.path().join("runtimes").join("GE-Proton8-1");

        let summary = extractor()
            .install(&archive, &target, &|_| {}, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(summary.entries, 2);
        assert_eq!(
            fs::read_to_string(target.join("share/version")).unwrap(),
            "GE-Proton8-1"
        );
        assert!(target.join("bin/wine").is_file());
        assert!(hidden_entries(&temp.path().join("runtimes")).is_empty());
    }

    #[tokio::test]
    async fn test_keeps_root_when_stripping_disabled() {
        let temp = TempDir::new().unwrap();
        let archive = write_archive(&temp, "GE-Proton8-1.tar.gz", &fixtures::tar_gz_archive(PROTON));
        let target = temp.path().join("GE-Proton8-1");

        ArchiveExtractor::new(ExtractorConfig::default().with_strip_single_root(false))
            .install(&archive, &target, &|_| {}, &CancelToken::new())
            .await
            .unwrap();

        assert!(target.join("GE-Proton8-1/bin/wine").is_file());
    }

    #[tokio::test]
    async fn test_multiple_top_level_entries_are_kept() {
        let temp = TempDir::new().unwrap();
        let files: &[(&str, &[u8])] = &[("bin/wine", b"x".as_slice()), ("lib/libwine.so", b"y".as_slice())];
        let archive = write_archive(&temp, "flat.tar.gz", &fixtures::tar_gz_archive(files));
        let target = temp.path().join("flat");

        extractor()
            .install(&archive, &target, &|_| {}, &CancelToken::new())
            .await
            .unwrap();

        assert!(target.join("bin/wine").is_file());
        assert!(target.join("lib/libwine.so").is_file());
    }

    #[tokio::test]
    async fn test_update_replaces_previous_install() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("GE-Proton8-1");
        fs::create_dir_all(target.join("bin")).unwrap();
        fs::write(target.join("stale.txt"), "old").unwrap();

        let archive = write_archive(&temp, "GE-Proton8-1.tar.gz", &fixtures::tar_gz_archive(PROTON));
        extractor()
            .install(&archive, &target, &|_| {}, &CancelToken::new())
            .await
            .unwrap();

        assert!(!target.join("stale.txt").exists());
        assert!(target.join("bin/wine").is_file());
        assert!(hidden_entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_tar_xz_install() {
        let temp = TempDir::new().unwrap();
        let archive = write_archive(&temp, "wine-lutris-8.tar.xz", &tar_xz_archive(PROTON));
        let target = temp.path().join("wine-lutris-8");

        extractor()
            .install(&archive, &target, &|_| {}, &CancelToken::new())
            .await
            .unwrap();

        assert!(target.join("bin/wine").is_file());
    }

    #[tokio::test]
    async fn test_format_detected_from_magic_without_extension() {
        let temp = TempDir::new().unwrap();
        let archive = write_archive(&temp, "download.bin", &fixtures::tar_gz_archive(PROTON));
        let target = temp.path().join("GE-Proton8-1");

        extractor()
            .install(&archive, &target, &|_| {}, &CancelToken::new())
            .await
            .unwrap();

        assert!(target.join("bin/wine").is_file());
    }

    #[tokio::test]
    async fn test_unsupported_format() {
        let temp = TempDir::new().unwrap();
        let archive = write_archive(&temp, "build.zip", b"PK\x03\x04 not really a zip");
        let target = temp.path().join("build");

        let err = extractor()
            .install(&archive, &target, &|_| {}, &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractionError::UnsupportedFormat { .. }));
        assert!(err.is_malformed());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_corrupt_archive_leaves_prior_install() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("GE-Proton8-1");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("marker"), "prior").unwrap();

        let mut bytes = fixtures::tar_gz_archive(PROTON);
        bytes.truncate(bytes.len() / 2);
        let archive = write_archive(&temp, "GE-Proton8-1.tar.gz", &bytes);

        let err = extractor()
            .install(&archive, &target, &|_| {}, &CancelToken::new())
            .await
            .unwrap_err();

        assert!(err.is_malformed(), "unexpected error: {err}");
        assert_eq!(fs::read_to_string(target.join("marker")).unwrap(), "prior");
        assert!(hidden_entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_garbage_archive_is_malformed() {
        let temp = TempDir::new().unwrap();
        let archive = write_archive(&temp, "junk.tar.gz", &[0u8; 2048]);
        let target = temp.path().join("junk");

        let err = extractor()
            .install(&archive, &target, &|_| {}, &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractionError::Malformed(_)));
        assert!(!target.exists());
        assert!(hidden_entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_rejects_entries_escaping_root() {
        let temp = TempDir::new().unwrap();

        let mut builder = tar::Builder::new(Vec::new());
        let data = b"owned";
        let mut header = tar::Header::new_old();
        let name = b"../escaped.txt";
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, &data[..]).unwrap();
        let bytes = builder.into_inner().unwrap();

        let extract_root = temp.path().join("runtimes");
        let archive = write_archive(&temp, "evil.tar", &bytes);
        let target = extract_root.join("evil");

        let err = extractor()
            .install(&archive, &target, &|_| {}, &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractionError::Malformed(_)));
        assert!(!extract_root.join("escaped.txt").exists());
        assert!(!target.exists());
        assert!(hidden_entries(&extract_root).is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_extraction_leaves_target_untouched() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("GE-Proton8-1");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("marker"), "prior").unwrap();

        let archive = write_archive(&temp, "GE-Proton8-1.tar.gz", &fixtures::tar_gz_archive(PROTON));
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = extractor()
            .install(&archive, &target, &|_| {}, &cancel)
            .await
            .unwrap_err();

        assert!(err.is_aborted());
        assert_eq!(fs::read_to_string(target.join("marker")).unwrap(), "prior");
        assert!(hidden_entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_io_failure_leaves_nothing_behind() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("runtimes");
        fs::write(&blocker, "not a directory").unwrap();
        let archive = write_archive(&temp, "GE-Proton8-1.tar.gz", &fixtures::tar_gz_archive(PROTON));
        let target = blocker.join("GE-Proton8-1");

        let err = extractor()
            .install(&archive, &target, &|_| {}, &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractionError::IoFailure { .. }), "unexpected error: {err}");
        assert!(err.is_retryable());
        assert_eq!(err.kind(), "io_failure");
        assert_eq!(fs::read_to_string(&blocker).unwrap(), "not a directory");
        assert!(hidden_entries(temp.path()).is_empty());
    }

    #[test]
    fn test_failed_swap_restores_previous_install() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("GE-Proton8-1");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("marker"), "prior").unwrap();

        // The staged content vanished, so the final rename fails.
        let missing = temp.path().join("gone");
        let err = swap_into_place(&missing, &target, temp.path(), "GE-Proton8-1").unwrap_err();

        assert!(matches!(err, ExtractionError::IoFailure { .. }), "unexpected error: {err}");
        assert_eq!(fs::read_to_string(target.join("marker")).unwrap(), "prior");
        assert!(hidden_entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_progress_ends_at_completion() {
        let temp = TempDir::new().unwrap();
        let payload: Vec<u8> = (0..300_000u32).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
        let files: &[(&str, &[u8])] = &[("big/blob.bin", payload.as_slice())];
        let archive = write_archive(&temp, "big.tar.gz", &fixtures::tar_gz_archive(files));
        let target = temp.path().join("big");

        let samples = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&samples);
        extractor()
            .install(
                &archive,
                &target,
                &move |s: ProgressSample| sink.lock().unwrap().push(s),
                &CancelToken::new(),
            )
            .await
            .unwrap();

        let samples = samples.lock().unwrap();
        assert!(!samples.is_empty());
        assert!(samples.windows(2).all(|w| w[0].percentage <= w[1].percentage));
        assert_eq!(samples.last().unwrap().percentage, 100.0);
        assert_eq!(fs::read(target.join("blob.bin")).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_sweep_leftovers() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("GE-Proton8-1/bin")).unwrap();
        fs::create_dir_all(temp.path().join(".GE-Proton8-1.staging-abc/x")).unwrap();
        fs::create_dir_all(temp.path().join(".GE-Proton7-5.old-def")).unwrap();
        let mut stray = File::create(temp.path().join(".note.staging-1")).unwrap();
        stray.write_all(b"partial").unwrap();

        let removed = sweep_leftovers(temp.path()).await.unwrap();

        assert_eq!(removed, 3);
        assert!(temp.path().join("GE-Proton8-1/bin").is_dir());
        assert!(hidden_entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_sweep_missing_root() {
        let temp = TempDir::new().unwrap();
        assert_eq!(sweep_leftovers(&temp.path().join("absent")).await.unwrap(), 0);
    }
}
