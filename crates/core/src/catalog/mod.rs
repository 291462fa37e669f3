//! Catalog sources.
//!
//! The catalog supplies the descriptors of every available build. It is
//! fetched on demand and handed to the registry; nothing is cached beyond
//! the registry's own copy.

mod sources;
mod types;

pub use sources::{JsonFileCatalog, StaticCatalog};
pub use types::{validate_descriptors, CatalogError};

use async_trait::async_trait;

use crate::artifact::ArtifactDescriptor;

/// Trait for catalog feeds.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Returns the name of this source, for logs.
    fn name(&self) -> &str;

    /// Fetches the current descriptor list.
    async fn fetch(&self) -> Result<Vec<ArtifactDescriptor>, CatalogError>;
}
