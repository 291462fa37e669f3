//! Download engine.
//!
//! Streams an artifact archive to a temporary file while reporting smoothed
//! throughput, then verifies it against the catalog checksum.
//!
//! # Cleanup
//!
//! The partial file is removed on every failure path: network errors,
//! checksum mismatches and cancellation. Cancellation is checked at every
//! chunk boundary and additionally raced against the next chunk, so an abort
//! takes effect within one chunk even on a stalled connection.

mod checksum;
mod config;
mod error;
mod http;
mod traits;

pub use checksum::{Checksum, ChecksumAlgorithm, ChecksumHasher};
pub use config::DownloaderConfig;
pub use error::DownloadError;
pub use http::HttpDownloader;
pub use traits::Downloader;
