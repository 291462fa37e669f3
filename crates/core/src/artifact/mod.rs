//! Artifact data model.
//!
//! An artifact is one installable build of a compatibility layer (a Wine or
//! Proton release), identified by its version string. The catalog supplies
//! the immutable [`ArtifactDescriptor`]; the registry owns the mutable
//! [`ArtifactStatus`].

mod types;

pub use types::{ArtifactDescriptor, ArtifactKind, ArtifactStatus, ArtifactView};
