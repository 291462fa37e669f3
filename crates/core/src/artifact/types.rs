//! Types describing installable artifacts.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of an artifact, as published by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    WineGe,
    ProtonGe,
    WineLutris,
    WineKron4ek,
    WineCrossover,
    GamePortingToolkit,
    Proton,
    #[serde(other)]
    Other,
}

impl ArtifactKind {
    /// Returns the string representation for API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::WineGe => "wine-ge",
            ArtifactKind::ProtonGe => "proton-ge",
            ArtifactKind::WineLutris => "wine-lutris",
            ArtifactKind::WineKron4ek => "wine-kron4ek",
            ArtifactKind::WineCrossover => "wine-crossover",
            ArtifactKind::GamePortingToolkit => "game-porting-toolkit",
            ArtifactKind::Proton => "proton",
            ArtifactKind::Other => "other",
        }
    }
}

/// Immutable identity and metadata of an installable artifact.
///
/// Supplied by the catalog; the core never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Version string, unique across the catalog.
    pub id: String,
    /// When the build was published.
    pub publish_date: DateTime<Utc>,
    /// Size of the compressed archive in bytes.
    pub download_size_bytes: u64,
    /// Size of the unpacked installation in bytes.
    pub installed_size_bytes: u64,
    /// Where the archive is fetched from.
    pub download_url: String,
    /// Expected digest of the archive (`sha256:<hex>`, `sha512:<hex>` or bare hex).
    pub checksum: String,
    /// Artifact category.
    pub kind: ArtifactKind,
    /// Install location, when the catalog already knows one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,
}

impl ArtifactDescriptor {
    /// Returns the id when it is usable as a single directory name.
    ///
    /// Ids containing path separators, `.` or `..` are rejected so an install
    /// can never land outside the install root.
    pub fn dir_name(&self) -> Option<&str> {
        let mut components = Path::new(&self.id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None)
                if !self.id.starts_with('.') && !self.id.contains(['/', '\\']) =>
            {
                Some(&self.id)
            }
            _ => None,
        }
    }

    /// File name of the remote archive, taken from the last URL path segment.
    pub fn archive_file_name(&self) -> Option<&str> {
        let without_query = self
            .download_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        without_query
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
    }
}

/// Mutable install status of one artifact. Owned by the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactStatus {
    pub installed: bool,
    pub update_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,
    /// Checksum of the archive the current installation came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_checksum: Option<String>,
}

/// Descriptor and status of an artifact, as listed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactView {
    #[serde(flatten)]
    pub descriptor: ArtifactDescriptor,
    #[serde(flatten)]
    pub status: ArtifactStatus,
}
