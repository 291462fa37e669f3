//! Types for the operation controller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::progress::ProgressPhase;

/// Terminal result of a command, the only thing surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Error,
    Aborted,
    AlreadyInProgress,
    NoOp,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Aborted => "aborted",
            Self::AlreadyInProgress => "already_in_progress",
            Self::NoOp => "no_op",
        }
    }

    /// Outcomes of work that actually ran, which get a notification.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Aborted)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands accepted by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Install,
    Update,
    Remove,
    Abort,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::Abort => "abort",
        }
    }
}

/// Lifecycle phase of one artifact.
///
/// `Removing` holds the slot while an install directory is deleted; it is
/// never published as progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Downloading,
    Unzipping,
    Removing,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::Unzipping => "unzipping",
            Self::Removing => "removing",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// The phase as seen on the progress surface, if it is visible there.
    pub fn progress_phase(&self) -> Option<ProgressPhase> {
        match self {
            Self::Downloading => Some(ProgressPhase::Downloading),
            Self::Unzipping => Some(ProgressPhase::Unzipping),
            Self::Idle | Self::Removing => None,
        }
    }
}

/// Errors that stop a command before any work starts.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Another operation holds the artifact.
    #[error("artifact {id} is busy ({phase:?})")]
    AlreadyInProgress { id: String, phase: Phase },

    /// The id is not in the registry.
    #[error("unknown artifact: {0}")]
    UnknownArtifact(String),

    /// The id cannot be used as an install directory name.
    #[error("artifact id cannot name an install directory: {0}")]
    InvalidIdentity(String),
}

impl From<&ControllerError> for Outcome {
    fn from(err: &ControllerError) -> Self {
        match err {
            ControllerError::AlreadyInProgress { .. } => Outcome::AlreadyInProgress,
            ControllerError::UnknownArtifact(_) | ControllerError::InvalidIdentity(_) => {
                Outcome::Error
            }
        }
    }
}
