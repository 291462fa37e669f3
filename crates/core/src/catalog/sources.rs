use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::types::{validate_descriptors, CatalogError};
use super::CatalogSource;
use crate::artifact::ArtifactDescriptor;

/// In-memory catalog, replaceable at runtime.
#[derive(Default)]
pub struct StaticCatalog {
    descriptors: RwLock<Vec<ArtifactDescriptor>>,
}

impl StaticCatalog {
    pub fn new(descriptors: Vec<ArtifactDescriptor>) -> Self {
        Self {
            descriptors: RwLock::new(descriptors),
        }
    }

    /// Replaces the listed descriptors; the next fetch returns them.
    pub fn replace(&self, descriptors: Vec<ArtifactDescriptor>) {
        *self
            .descriptors
            .write()
            .unwrap_or_else(PoisonError::into_inner) = descriptors;
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<Vec<ArtifactDescriptor>, CatalogError> {
        let descriptors = self
            .descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        validate_descriptors(&descriptors)?;
        Ok(descriptors)
    }
}

/// Either a bare list or `{"artifacts": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    List(Vec<ArtifactDescriptor>),
    Wrapped { artifacts: Vec<ArtifactDescriptor> },
}

/// Catalog read from a JSON file on every fetch.
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for JsonFileCatalog {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn fetch(&self) -> Result<Vec<ArtifactDescriptor>, CatalogError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| CatalogError::Read {
                path: self.path.clone(),
                source: e,
            })?;

        let parsed: CatalogFile =
            serde_json::from_str(&content).map_err(|e| CatalogError::Parse {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        let descriptors = match parsed {
            CatalogFile::List(list) | CatalogFile::Wrapped { artifacts: list } => list,
        };

        validate_descriptors(&descriptors)?;
        debug!(
            "Loaded {} catalog entries from {:?}",
            descriptors.len(),
            self.path
        );
        Ok(descriptors)
    }
}
