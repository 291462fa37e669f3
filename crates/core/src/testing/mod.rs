//! Testing utilities and mock engines.
//!
//! Mock implementations of the [`Downloader`](crate::download::Downloader)
//! and [`Extractor`](crate::extract::Extractor) traits, plus fixtures for
//! descriptors and in-memory archives, so the controller and the server can
//! be exercised without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use cellar_core::testing::{fixtures, MockDownloader};
//!
//! let downloader = MockDownloader::new(temp.path());
//! downloader.set_chunking(50, Duration::from_millis(10)).await;
//!
//! let registry = ArtifactRegistry::with_catalog(vec![fixtures::descriptor("GE-Proton8-1")]);
//! ```

mod mock_downloader;
mod mock_extractor;

pub use mock_downloader::MockDownloader;
pub use mock_extractor::MockExtractor;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    use crate::artifact::{ArtifactDescriptor, ArtifactKind};
    use crate::download::{Checksum, ChecksumAlgorithm};

    /// Builds a `.tar.gz` archive in memory. Output is deterministic.
    pub fn tar_gz_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        for (path, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_mtime(1_700_000_000);
            header.set_cksum();
            builder
                .append_data(&mut header, path, *data)
                .expect("append archive entry");
        }
        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .expect("finish archive")
    }

    /// A small runtime build with a single top-level directory named `id`.
    pub fn runtime_archive(id: &str) -> Vec<u8> {
        let wine = format!("{}/bin/wine", id);
        let version = format!("{}/version", id);
        tar_gz_archive(&[
            (wine.as_str(), b"#!/bin/sh\nexec true\n".as_slice()),
            (version.as_str(), id.as_bytes()),
        ])
    }

    /// `sha256:<hex>` of `bytes`.
    pub fn sha256(bytes: &[u8]) -> String {
        Checksum::compute(ChecksumAlgorithm::Sha256, bytes).to_string()
    }

    /// A descriptor whose checksum matches [`runtime_archive`] for the same id.
    pub fn descriptor(id: &str) -> ArtifactDescriptor {
        let archive = runtime_archive(id);
        ArtifactDescriptor {
            id: id.to_string(),
            publish_date: Utc::now(),
            download_size_bytes: archive.len() as u64,
            installed_size_bytes: archive.len() as u64 * 4,
            download_url: format!("https://downloads.example.com/runtimes/{}.tar.gz", id),
            checksum: sha256(&archive),
            kind: ArtifactKind::WineGe,
            install_dir: None,
        }
    }

    /// A descriptor for `archive` served under `id`.
    pub fn descriptor_for(id: &str, archive: &[u8]) -> ArtifactDescriptor {
        ArtifactDescriptor {
            download_size_bytes: archive.len() as u64,
            checksum: sha256(archive),
            ..descriptor(id)
        }
    }
}
