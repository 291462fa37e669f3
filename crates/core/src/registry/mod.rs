//! Artifact registry.
//!
//! Holds the known artifacts and their install status. Reads may run
//! concurrently with each other; writes lock only the entry they touch, so
//! writes to different artifacts never contend.

mod artifact_registry;

pub use artifact_registry::{ArtifactRegistry, SyncSummary};
