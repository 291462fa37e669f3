use std::collections::HashSet;
use std::path::PathBuf;

use thiserror::Error;

use crate::artifact::ArtifactDescriptor;

/// Errors that can occur while loading the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Duplicate artifact id in catalog: {0}")]
    DuplicateId(String),

    #[error("Invalid catalog entry: {0}")]
    InvalidEntry(String),
}

/// Rejects empty and duplicate ids.
pub fn validate_descriptors(descriptors: &[ArtifactDescriptor]) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for descriptor in descriptors {
        if descriptor.id.trim().is_empty() {
            return Err(CatalogError::InvalidEntry(format!(
                "empty id for {}",
                descriptor.download_url
            )));
        }
        if descriptor.download_url.is_empty() {
            return Err(CatalogError::InvalidEntry(format!(
                "{} has no download url",
                descriptor.id
            )));
        }
        if !seen.insert(descriptor.id.as_str()) {
            return Err(CatalogError::DuplicateId(descriptor.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_validate_descriptors() {
        let ok = vec![fixtures::descriptor("a"), fixtures::descriptor("b")];
        assert!(validate_descriptors(&ok).is_ok());

        let dup = vec![fixtures::descriptor("a"), fixtures::descriptor("a")];
        assert!(matches!(
            validate_descriptors(&dup),
            Err(CatalogError::DuplicateId(id)) if id == "a"
        ));

        let mut blank = fixtures::descriptor("a");
        blank.id = "  ".to_string();
        assert!(matches!(
            validate_descriptors(&[blank]),
            Err(CatalogError::InvalidEntry(_))
        ));
    }
}
