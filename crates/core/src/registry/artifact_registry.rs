//! In-memory artifact registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::artifact::{ArtifactDescriptor, ArtifactStatus, ArtifactView};

struct Entry {
    descriptor: ArtifactDescriptor,
    status: ArtifactStatus,
}

/// What changed during a catalog sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub added: usize,
    pub removed: usize,
    pub updates_available: usize,
}

/// Registry of known artifacts and their install status.
#[derive(Default)]
pub struct ArtifactRegistry {
    entries: RwLock<HashMap<String, Arc<RwLock<Entry>>>>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the given descriptors, none installed.
    pub fn with_catalog(descriptors: impl IntoIterator<Item = ArtifactDescriptor>) -> Self {
        let registry = Self::new();
        registry.sync_catalog(descriptors);
        registry
    }

    fn entry(&self, id: &str) -> Option<Arc<RwLock<Entry>>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Applies `f` to the entry for `id`.
    ///
    /// Mutating an unknown id is a caller bug: it panics in debug builds and
    /// is logged and ignored otherwise.
    fn update(&self, id: &str, op: &str, f: impl FnOnce(&mut Entry)) {
        let Some(entry) = self.entry(id) else {
            error!("Registry {} called for unknown artifact {}", op, id);
            debug_assert!(false, "registry {} called for unknown artifact {}", op, id);
            return;
        };
        let mut entry = entry.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut entry);
    }

    /// Whether the artifact is known.
    pub fn contains(&self, id: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Current status of an artifact.
    pub fn get(&self, id: &str) -> Option<ArtifactStatus> {
        self.entry(id).map(|e| {
            e.read()
                .unwrap_or_else(PoisonError::into_inner)
                .status
                .clone()
        })
    }

    /// Catalog descriptor of an artifact.
    pub fn descriptor(&self, id: &str) -> Option<ArtifactDescriptor> {
        self.entry(id).map(|e| {
            e.read()
                .unwrap_or_else(PoisonError::into_inner)
                .descriptor
                .clone()
        })
    }

    /// Descriptor and status of an artifact, read under one lock.
    pub fn view(&self, id: &str) -> Option<ArtifactView> {
        self.entry(id).map(|e| {
            let entry = e.read().unwrap_or_else(PoisonError::into_inner);
            ArtifactView {
                descriptor: entry.descriptor.clone(),
                status: entry.status.clone(),
            }
        })
    }

    /// All known artifacts, newest first.
    pub fn list(&self) -> Vec<ArtifactView> {
        let entries: Vec<_> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut views: Vec<ArtifactView> = entries
            .iter()
            .map(|e| {
                let entry = e.read().unwrap_or_else(PoisonError::into_inner);
                ArtifactView {
                    descriptor: entry.descriptor.clone(),
                    status: entry.status.clone(),
                }
            })
            .collect();
        views.sort_by(|a, b| {
            b.descriptor
                .publish_date
                .cmp(&a.descriptor.publish_date)
                .then_with(|| a.descriptor.id.cmp(&b.descriptor.id))
        });
        views
    }

    /// Marks the artifact installed at `install_dir` from the archive whose
    /// verified checksum is `checksum`.
    ///
    /// The update flag is recomputed against the current listing, so a build
    /// republished while the install ran is flagged right away.
    pub fn set_installed(&self, id: &str, install_dir: PathBuf, checksum: &str) {
        self.update(id, "set_installed", |entry| {
            entry.status.installed = true;
            entry.status.update_available = entry.descriptor.checksum != checksum;
            entry.status.installed_checksum = Some(checksum.to_string());
            entry.status.install_dir = Some(install_dir);
        });
        debug!("Artifact {} marked installed", id);
    }

    /// Marks the artifact as not installed.
    pub fn set_uninstalled(&self, id: &str) {
        self.update(id, "set_uninstalled", |entry| {
            entry.status = ArtifactStatus::default();
        });
        debug!("Artifact {} marked uninstalled", id);
    }

    pub fn set_update_available(&self, id: &str, available: bool) {
        self.update(id, "set_update_available", |entry| {
            entry.status.update_available = available;
        });
    }

    /// Replaces the descriptor set with a fresh catalog listing.
    pub fn sync_catalog(
        &self,
        descriptors: impl IntoIterator<Item = ArtifactDescriptor>,
    ) -> SyncSummary {
        self.sync_catalog_retaining(descriptors, |_| false)
    }

    /// Replaces the descriptor set, keeping delisted ids for which `keep`
    /// returns true.
    ///
    /// New ids start out not installed. Delisted ids are dropped unless they
    /// are installed or retained. An installed artifact whose listed checksum
    /// differs from the one it was installed from is flagged as updatable.
    pub fn sync_catalog_retaining(
        &self,
        descriptors: impl IntoIterator<Item = ArtifactDescriptor>,
        keep: impl Fn(&str) -> bool,
    ) -> SyncSummary {
        let mut summary = SyncSummary::default();
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let mut listed = HashMap::new();
        for descriptor in descriptors {
            listed.insert(descriptor.id.clone(), descriptor);
        }

        entries.retain(|id, entry| {
            if listed.contains_key(id) || keep(id) {
                return true;
            }
            let installed = entry
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .status
                .installed;
            if !installed {
                summary.removed += 1;
            }
            installed
        });

        for (id, descriptor) in listed {
            match entries.get(&id) {
                Some(existing) => {
                    let mut entry = existing.write().unwrap_or_else(PoisonError::into_inner);
                    if entry.status.installed {
                        let changed = entry
                            .status
                            .installed_checksum
                            .as_deref()
                            .is_some_and(|installed| installed != descriptor.checksum);
                        entry.status.update_available = changed;
                        if changed {
                            summary.updates_available += 1;
                        }
                    }
                    entry.descriptor = descriptor;
                }
                None => {
                    entries.insert(
                        id,
                        Arc::new(RwLock::new(Entry {
                            descriptor,
                            status: ArtifactStatus::default(),
                        })),
                    );
                    summary.added += 1;
                }
            }
        }

        info!(
            "Catalog synced: {} added, {} removed, {} updates available",
            summary.added, summary.removed, summary.updates_available
        );
        summary
    }

    /// Marks every known artifact whose directory exists under `install_root`
    /// as installed. Returns how many were recovered.
    ///
    /// The archive checksum of a recovered install is unknown, so no update
    /// is flagged for it until it is reinstalled.
    pub fn recover_installed(&self, install_root: &Path) -> usize {
        let entries: Vec<_> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut recovered = 0;
        for entry in entries {
            let mut entry = entry.write().unwrap_or_else(PoisonError::into_inner);
            if entry.status.installed {
                continue;
            }
            let Some(dir_name) = entry.descriptor.dir_name() else {
                continue;
            };
            let dir = install_root.join(dir_name);
            if dir.is_dir() {
                info!("Recovered installed artifact {} at {:?}", entry.descriptor.id, dir);
                entry.status.installed = true;
                entry.status.install_dir = Some(dir);
                recovered += 1;
            }
        }
        recovered
    }
}
