//! Extraction engine.
//!
//! Unpacks a verified archive into a staging directory next to the target
//! and swaps it into place with renames, so an existing installation at the
//! same path is replaced in one step and never observed half-written.
//!
//! Supported formats are `.tar.gz`/`.tgz`, `.tar.xz`/`.txz` and plain `.tar`.
//! The format comes from the file name, falling back to the archive's magic
//! bytes when the name carries no recognised extension.

mod archive;
mod config;
mod error;
mod traits;

pub use archive::{sweep_leftovers, ArchiveExtractor, ArchiveFormat};
pub use config::ExtractorConfig;
pub use error::ExtractionError;
pub use traits::{ExtractionSummary, Extractor};
