//! Operation controller configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the operation controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Root under which artifacts without an explicit install directory
    /// are placed, one directory per id.
    pub install_root: PathBuf,
}

impl ControllerConfig {
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
        }
    }
}
