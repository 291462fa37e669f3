//! Operation controller implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::config::ControllerConfig;
use super::types::{Command, ControllerError, Outcome, Phase};
use crate::artifact::ArtifactDescriptor;
use crate::cancel::CancelToken;
use crate::download::Downloader;
use crate::extract::Extractor;
use crate::metrics::{ACTIVE_OPERATIONS, OPERATIONS_TOTAL, OPERATION_DURATION};
use crate::notify::{OutcomeEvent, OutcomeHandle};
use crate::progress::{ProgressChannel, ProgressEvent, ProgressPhase, ProgressSample, Subscription};
use crate::registry::{ArtifactRegistry, SyncSummary};

/// Mutable state of one artifact, only touched through its [`Slot`].
struct OperationState {
    phase: Phase,
    /// Present while an install or update is running.
    cancel: Option<CancelToken>,
    /// Bumped every time the slot returns to Idle.
    generation: u64,
}

struct Slot {
    state: Mutex<OperationState>,
    released: watch::Sender<u64>,
}

impl Slot {
    fn new() -> Self {
        let (released, _) = watch::channel(0);
        Self {
            state: Mutex::new(OperationState {
                phase: Phase::Idle,
                cancel: None,
                generation: 0,
            }),
            released,
        }
    }

    fn lock(&self) -> MutexGuard<'_, OperationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive hold on a slot. Returns it to Idle when dropped, on every exit
/// path including a panicking task.
struct Claim {
    id: String,
    slot: Arc<Slot>,
    cancel: CancelToken,
}

impl Claim {
    fn set_phase(&self, phase: Phase) {
        let mut state = self.slot.lock();
        ACTIVE_OPERATIONS
            .with_label_values(&[state.phase.as_str()])
            .dec();
        ACTIVE_OPERATIONS.with_label_values(&[phase.as_str()]).inc();
        info!("{}: {} -> {}", self.id, state.phase.as_str(), phase.as_str());
        state.phase = phase;
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        let generation = {
            let mut state = self.slot.lock();
            ACTIVE_OPERATIONS
                .with_label_values(&[state.phase.as_str()])
                .dec();
            info!("{}: {} -> idle", self.id, state.phase.as_str());
            state.phase = Phase::Idle;
            state.cancel = None;
            state.generation += 1;
            state.generation
        };
        self.slot.released.send_replace(generation);
    }
}

/// Deletes a downloaded archive once the operation is done with it.
struct DownloadedArchive(PathBuf);

impl Drop for DownloadedArchive {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => debug!("Removed archive {:?}", self.0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove archive {:?}: {}", self.0, e),
        }
    }
}

struct Inner<D: ?Sized, E: ?Sized> {
    config: ControllerConfig,
    registry: Arc<ArtifactRegistry>,
    downloader: Arc<D>,
    extractor: Arc<E>,
    progress: ProgressChannel,
    notifier: Option<OutcomeHandle>,
    slots: RwLock<HashMap<String, Arc<Slot>>>,
}

/// Drives artifacts through download, extraction and removal.
///
/// Cloning is cheap and every clone shares the same slots. The engines may
/// be trait objects (`OperationController<dyn Downloader, dyn Extractor>`).
pub struct OperationController<D: ?Sized, E: ?Sized> {
    inner: Arc<Inner<D, E>>,
}

impl<D: ?Sized, E: ?Sized> Clone for OperationController<D, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D, E> OperationController<D, E>
where
    D: Downloader + ?Sized + 'static,
    E: Extractor + ?Sized + 'static,
{
    pub fn new(
        config: ControllerConfig,
        registry: Arc<ArtifactRegistry>,
        downloader: Arc<D>,
        extractor: Arc<E>,
        progress: ProgressChannel,
        notifier: Option<OutcomeHandle>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                downloader,
                extractor,
                progress,
                notifier,
                slots: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<ArtifactRegistry> {
        &self.inner.registry
    }

    pub fn progress(&self) -> &ProgressChannel {
        &self.inner.progress
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    /// Current phase of `id`; unknown ids are Idle.
    pub fn phase(&self, id: &str) -> Phase {
        self.inner
            .existing_slot(id)
            .map(|slot| slot.lock().phase)
            .unwrap_or_default()
    }

    /// Subscribes to the progress of `id`. Does not start any work.
    pub fn subscribe(&self, id: &str) -> Subscription {
        self.inner.progress.subscribe(id)
    }

    /// Where `id` is, or would be, installed.
    pub fn install_dir(&self, id: &str) -> Result<PathBuf, ControllerError> {
        self.inner.prepare(id).map(|(_, dir)| dir)
    }

    pub async fn install(&self, id: &str) -> Outcome {
        self.run_install(Command::Install, id).await
    }

    /// Same as [`install`](Self::install): the new build replaces the old
    /// one through the same staged swap, whether or not an update is flagged.
    pub async fn update(&self, id: &str) -> Outcome {
        self.run_install(Command::Update, id).await
    }

    async fn run_install(&self, command: Command, id: &str) -> Outcome {
        let (claim, descriptor, target) = match self.inner.claim_prepared(id, Phase::Downloading) {
            Ok(claimed) => claimed,
            Err(e) => return self.inner.reject(command, id, &e),
        };

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            inner
                .install_pipeline(command, claim, descriptor, target)
                .await
        });
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("{} task for {} failed: {}", command.as_str(), id, e);
                Outcome::Error
            }
        }
    }

    /// Deletes the install directory of `id`.
    ///
    /// Returns `Success` if something was deleted and `NoOp` if the
    /// directory was already absent.
    pub async fn remove(&self, id: &str) -> Outcome {
        let command = Command::Remove;
        let (claim, _, target) = match self.inner.claim_prepared(id, Phase::Removing) {
            Ok(claimed) => claimed,
            Err(e) => return self.inner.reject(command, id, &e),
        };

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.remove_pipeline(claim, target).await });
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("remove task for {} failed: {}", id, e);
                Outcome::Error
            }
        }
    }

    /// Cancels a running install or update and waits until `id` is Idle.
    ///
    /// Returns `NoOp` when there is nothing to abort.
    pub async fn abort(&self, id: &str) -> Outcome {
        let outcome = self.cancel_running(id).await;
        OPERATIONS_TOTAL
            .with_label_values(&[Command::Abort.as_str(), outcome.as_str()])
            .inc();
        outcome
    }

    async fn cancel_running(&self, id: &str) -> Outcome {
        let Some(slot) = self.inner.existing_slot(id) else {
            return Outcome::NoOp;
        };

        let (cancel, generation, mut released) = {
            let state = slot.lock();
            match (state.phase, &state.cancel) {
                (Phase::Downloading | Phase::Unzipping, Some(cancel)) => {
                    (cancel.clone(), state.generation, slot.released.subscribe())
                }
                (phase, _) => {
                    debug!("Nothing to abort for {} ({})", id, phase.as_str());
                    return Outcome::NoOp;
                }
            }
        };

        info!("Aborting {}", id);
        cancel.cancel();
        let _ = released.wait_for(|g| *g > generation).await;
        info!("{} aborted", id);
        Outcome::Aborted
    }

    /// Aborts every running install or update. Returns how many were aborted.
    pub async fn abort_all(&self) -> usize {
        let running: Vec<String> = self
            .inner
            .snapshot()
            .into_iter()
            .filter(|(_, phase)| matches!(phase, Phase::Downloading | Phase::Unzipping))
            .map(|(id, _)| id)
            .collect();
        if running.is_empty() {
            return 0;
        }

        info!("Aborting {} running operations", running.len());
        join_all(running.iter().map(|id| self.abort(id)))
            .await
            .into_iter()
            .filter(|outcome| *outcome == Outcome::Aborted)
            .count()
    }

    /// Every artifact that is not Idle, with its phase.
    pub fn active(&self) -> Vec<(String, Phase)> {
        self.inner.snapshot()
    }

    /// Replaces the catalog, keeping entries that are busy right now.
    ///
    /// Busy is decided under the registry write lock. An operation claims
    /// its slot before reading the registry, so it either sees the new
    /// listing or has its entry retained.
    pub fn sync_catalog(
        &self,
        descriptors: impl IntoIterator<Item = ArtifactDescriptor>,
    ) -> SyncSummary {
        self.inner
            .registry
            .sync_catalog_retaining(descriptors, |id| !self.phase(id).is_idle())
    }
}

impl<D, E> Inner<D, E>
where
    D: Downloader + ?Sized + 'static,
    E: Extractor + ?Sized + 'static,
{
    fn existing_slot(&self, id: &str) -> Option<Arc<Slot>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn slot(&self, id: &str) -> Arc<Slot> {
        if let Some(slot) = self.existing_slot(id) {
            return slot;
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            slots
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Slot::new())),
        )
    }

    fn snapshot(&self) -> Vec<(String, Phase)> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, slot)| (id.clone(), slot.lock().phase))
            .filter(|(_, phase)| !phase.is_idle())
            .collect()
    }

    fn prepare(&self, id: &str) -> Result<(ArtifactDescriptor, PathBuf), ControllerError> {
        let descriptor = self
            .registry
            .descriptor(id)
            .ok_or_else(|| ControllerError::UnknownArtifact(id.to_string()))?;

        if let Some(dir) = self.registry.get(id).and_then(|status| status.install_dir) {
            return Ok((descriptor, dir));
        }
        if let Some(dir) = descriptor.install_dir.clone() {
            return Ok((descriptor, dir));
        }
        let dir = descriptor
            .dir_name()
            .map(|name| self.config.install_root.join(name))
            .ok_or_else(|| ControllerError::InvalidIdentity(id.to_string()))?;
        Ok((descriptor, dir))
    }

    /// Validates `id`, claims its slot, then reads the descriptor the
    /// operation will use.
    ///
    /// The descriptor is read again after claiming: a catalog sync that ran
    /// in between may have dropped or republished the artifact.
    fn claim_prepared(
        &self,
        id: &str,
        phase: Phase,
    ) -> Result<(Claim, ArtifactDescriptor, PathBuf), ControllerError> {
        self.prepare(id)?;
        let claim = self.claim(id, phase)?;
        let (descriptor, target) = self.prepare(id)?;
        Ok((claim, descriptor, target))
    }

    fn claim(&self, id: &str, phase: Phase) -> Result<Claim, ControllerError> {
        let slot = self.slot(id);
        let cancel = CancelToken::new();
        {
            let mut state = slot.lock();
            if !state.phase.is_idle() {
                return Err(ControllerError::AlreadyInProgress {
                    id: id.to_string(),
                    phase: state.phase,
                });
            }
            state.phase = phase;
            state.cancel = (phase != Phase::Removing).then(|| cancel.clone());
        }
        ACTIVE_OPERATIONS.with_label_values(&[phase.as_str()]).inc();
        info!("{}: idle -> {}", id, phase.as_str());

        Ok(Claim {
            id: id.to_string(),
            slot,
            cancel,
        })
    }

    fn reject(&self, command: Command, id: &str, err: &ControllerError) -> Outcome {
        let outcome = Outcome::from(err);
        match err {
            ControllerError::AlreadyInProgress { .. } => {
                info!("{} {} rejected: {}", command.as_str(), id, err)
            }
            _ => warn!("{} {} rejected: {}", command.as_str(), id, err),
        }
        OPERATIONS_TOTAL
            .with_label_values(&[command.as_str(), outcome.as_str()])
            .inc();
        outcome
    }

    fn publisher<'a>(
        &'a self,
        id: &'a str,
        phase: ProgressPhase,
    ) -> impl Fn(ProgressSample) + Send + Sync + 'a {
        move |sample| self.progress.publish(id, ProgressEvent::new(phase, sample))
    }

    async fn install_pipeline(
        &self,
        command: Command,
        claim: Claim,
        descriptor: ArtifactDescriptor,
        target: PathBuf,
    ) -> Outcome {
        let started = Instant::now();
        let outcome = self.download_and_extract(&claim, &descriptor, &target).await;
        if outcome == Outcome::Success {
            self.registry
                .set_installed(&descriptor.id, target, &descriptor.checksum);
        }
        drop(claim);

        self.finish(command, &descriptor.id, outcome, started);
        outcome
    }

    async fn download_and_extract(
        &self,
        claim: &Claim,
        descriptor: &ArtifactDescriptor,
        target: &Path,
    ) -> Outcome {
        let id = descriptor.id.as_str();

        let on_download = self.publisher(id, ProgressPhase::Downloading);
        let archive = match self
            .downloader
            .download(descriptor, &on_download, &claim.cancel)
            .await
        {
            Ok(path) => DownloadedArchive(path),
            Err(e) if e.is_aborted() => return Outcome::Aborted,
            Err(e) => {
                warn!("Download of {} failed ({}): {}", id, e.kind(), e);
                return Outcome::Error;
            }
        };
        if claim.cancel.is_cancelled() {
            return Outcome::Aborted;
        }

        claim.set_phase(Phase::Unzipping);
        let on_unzip = self.publisher(id, ProgressPhase::Unzipping);
        match self
            .extractor
            .install(&archive.0, target, &on_unzip, &claim.cancel)
            .await
        {
            Ok(summary) => {
                debug!(
                    "{}: {} entries from {} archive bytes",
                    id, summary.entries, summary.bytes_read
                );
                Outcome::Success
            }
            Err(e) if e.is_aborted() => Outcome::Aborted,
            Err(e) => {
                warn!("Extraction of {} failed ({}): {}", id, e.kind(), e);
                Outcome::Error
            }
        }
    }

    async fn remove_pipeline(&self, claim: Claim, target: PathBuf) -> Outcome {
        let started = Instant::now();
        let id = claim.id.clone();
        let was_installed = self
            .registry
            .get(&id)
            .map(|status| status.installed)
            .unwrap_or(false);

        let outcome = match tokio::fs::symlink_metadata(&target).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("{}: nothing to remove at {:?}", id, target);
                if was_installed {
                    self.registry.set_uninstalled(&id);
                }
                Outcome::NoOp
            }
            Err(e) => {
                warn!("Failed to inspect {:?}: {}", target, e);
                Outcome::Error
            }
            Ok(meta) => {
                let result = if meta.is_dir() {
                    tokio::fs::remove_dir_all(&target).await
                } else {
                    tokio::fs::remove_file(&target).await
                };
                match result {
                    Ok(()) => {
                        info!("Removed {} from {:?}", id, target);
                        self.registry.set_uninstalled(&id);
                        Outcome::Success
                    }
                    Err(e) => {
                        warn!("Failed to remove {:?}: {}", target, e);
                        if tokio::fs::symlink_metadata(&target).await.is_err() {
                            self.registry.set_uninstalled(&id);
                        }
                        Outcome::Error
                    }
                }
            }
        };
        drop(claim);

        self.finish(Command::Remove, &id, outcome, started);
        outcome
    }

    fn finish(&self, command: Command, id: &str, outcome: Outcome, started: Instant) {
        OPERATIONS_TOTAL
            .with_label_values(&[command.as_str(), outcome.as_str()])
            .inc();
        OPERATION_DURATION
            .with_label_values(&[command.as_str()])
            .observe(started.elapsed().as_secs_f64());
        info!(
            "{} {} finished: {} in {:.1}s",
            command.as_str(),
            id,
            outcome,
            started.elapsed().as_secs_f64()
        );

        if outcome.is_terminal() {
            if let Some(notifier) = &self.notifier {
                notifier.try_emit(OutcomeEvent {
                    artifact_id: id.to_string(),
                    command,
                    outcome,
                });
            }
        }
    }
}
