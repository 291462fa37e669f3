//! Lifecycle management for optional, versioned runtime builds.
//!
//! The [`controller::OperationController`] ties the pieces together: it
//! claims an artifact, drives the [`download`] engine and then the
//! [`extract`] engine, republishes their progress on the
//! [`progress::ProgressChannel`] and records the result in the
//! [`registry::ArtifactRegistry`].

pub mod artifact;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod download;
pub mod extract;
pub mod metrics;
pub mod notify;
pub mod progress;
pub mod registry;
pub mod testing;

pub use artifact::{ArtifactDescriptor, ArtifactKind, ArtifactStatus, ArtifactView};
pub use cancel::CancelToken;
pub use catalog::{CatalogError, CatalogSource, JsonFileCatalog, StaticCatalog};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, CatalogConfig,
    Config, ConfigError, ServerConfig, StorageConfig,
};
pub use controller::{Command, ControllerConfig, ControllerError, OperationController, Outcome, Phase};
pub use download::{DownloadError, Downloader, DownloaderConfig, HttpDownloader};
pub use extract::{ArchiveExtractor, ExtractionError, Extractor, ExtractorConfig};
pub use notify::{create_outcome_system, OutcomeEnvelope, OutcomeEvent, OutcomeHandle, OutcomeSink};
pub use progress::{ProgressChannel, ProgressEvent, ProgressPhase, ProgressSample, Subscription};
pub use registry::{ArtifactRegistry, SyncSummary};
