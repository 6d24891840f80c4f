//! Update manager implementation.
//!
//! # Architecture
//!
//! - **Commands** (`start`, `pause`, `resume`, `cancel`, `retry`, ...) are
//!   issued by the UI and translated into registry mutations and host engine
//!   commands.
//! - **Host events** arrive over a channel and are reduced one at a time by
//!   [`UpdateManager::handle_host_event`] (see `host_events`).
//! - **Installs** run as spawned tasks (see `install`); each drives one game's
//!   chain of resources in a loop and does its filesystem work on the
//!   blocking pool.
//!
//! # Concurrency Model
//!
//! - The registry lock is synchronous and never held across an await
//! - Every mutation pushes a snapshot through the [`ProgressReporter`]
//! - Long-running work re-enters the registry through the entry's
//!   operation id, so a cancel or a fresh start invalidates it
//! - A per-entry `installing` flag, claimed and released under the registry
//!   lock, keeps a single install loop per game

mod host_events;
mod install;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use levelup_core::{
    DownloadEnginePort, DownloadStatus, GameId, GameInfoRepository, HostEvent, InstallLayout,
    InternalVersion, InterruptReason, PipelineSettings, ProtocolRegistrarPort, ShortcutPort,
    StorageProbePort, StorageSample, UpdateEntry, UpdateError, UpdateEventEmitterPort,
    UpdateProgressSnapshot, UpdateRequest,
};

use crate::registry::UpdateRegistry;
use crate::reporter::ProgressReporter;
use crate::retry::{
    DownloadRetry, RetryOutcome, find_first_erroring_download, find_first_erroring_install,
    plan_download_retry,
};

/// Dependencies for creating an update manager.
///
/// This struct bundles all the ports and configuration needed to construct
/// an `UpdateManager`.
pub struct UpdateManagerDeps {
    /// Host download engine.
    pub engine: Arc<dyn DownloadEnginePort>,
    /// Port for emitting update events to the UI.
    pub event_emitter: Arc<dyn UpdateEventEmitterPort>,
    /// Persistent record of installed games.
    pub game_info: Arc<dyn GameInfoRepository>,
    pub shortcuts: Arc<dyn ShortcutPort>,
    pub protocols: Arc<dyn ProtocolRegistrarPort>,
    /// Free-space probe used to classify interruptions.
    pub storage: Arc<dyn StorageProbePort>,
    pub settings: PipelineSettings,
}

/// Build an update manager from its dependencies.
///
/// The registry is created here and owned by the manager; nothing else in
/// the process holds it.
pub fn build_update_manager(deps: UpdateManagerDeps) -> Arc<UpdateManager> {
    let registry = Arc::new(UpdateRegistry::new());
    Arc::new(UpdateManager {
        reporter: ProgressReporter::new(Arc::clone(&registry), deps.event_emitter),
        registry,
        engine: deps.engine,
        game_info: deps.game_info,
        shortcuts: deps.shortcuts,
        protocols: deps.protocols,
        storage: deps.storage,
        settings: deps.settings,
    })
}

/// Result of a start command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new operation was registered and resource 0 requested.
    Started { operation_id: Uuid },
    /// The game already has an unfinished update; nothing changed.
    AlreadyInProgress,
}

/// Sequences downloads and installs for every game with a live update.
pub struct UpdateManager {
    registry: Arc<UpdateRegistry>,
    reporter: ProgressReporter,
    engine: Arc<dyn DownloadEnginePort>,
    game_info: Arc<dyn GameInfoRepository>,
    shortcuts: Arc<dyn ShortcutPort>,
    protocols: Arc<dyn ProtocolRegistrarPort>,
    storage: Arc<dyn StorageProbePort>,
    settings: PipelineSettings,
}

impl UpdateManager {
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Register an update for a game and request its first resource.
    ///
    /// Starting a game that already has an unfinished update is a no-op.
    /// Staged artifacts left by an earlier attempt are cleared first.
    pub async fn start(&self, request: UpdateRequest) -> Result<StartOutcome, UpdateError> {
        request.validate()?;
        let entry = UpdateEntry::new(request, Utc::now());
        let operation_id = entry.operation_id;
        let game_id = entry.game_id.clone();
        let first_url = entry.resources[0].download_url.clone();
        let staged = InstallLayout::for_entry(&entry).staged_artifacts(
            &entry
                .resources
                .iter()
                .map(|r| r.resource.clone())
                .collect::<Vec<_>>(),
        );

        if !self.registry.create(entry) {
            tracing::info!(target: "levelup.download", game_id = %game_id, "update already in progress");
            return Ok(StartOutcome::AlreadyInProgress);
        }

        remove_staged(staged).await;

        tracing::info!(
            target: "levelup.download",
            game_id = %game_id,
            %operation_id,
            url = %first_url,
            "starting update"
        );
        self.reporter.report(&game_id, |_| ());
        self.engine
            .start_download(&first_url, &self.settings.request_headers);
        Ok(StartOutcome::Started { operation_id })
    }

    /// Pause the download of one resource.
    pub fn pause(&self, game_id: &GameId, version: InternalVersion) -> Result<(), UpdateError> {
        let handle = self
            .registry
            .with_entry(game_id, |entry| {
                entry.index_of(version).map(|i| entry.resources[i].handle)
            })
            .ok_or_else(|| UpdateError::not_found(game_id.clone()))?
            .ok_or_else(|| UpdateError::resource_not_found(game_id.clone(), version))?;

        match handle {
            Some(handle) => self.engine.pause(handle),
            None => {
                tracing::debug!(target: "levelup.download", game_id = %game_id, %version, "pause before attach ignored");
            }
        }
        Ok(())
    }

    /// Resume the download of one resource, restarting it when the host can
    /// no longer continue from the current offset.
    pub fn resume(&self, game_id: &GameId, version: InternalVersion) -> Result<(), UpdateError> {
        let entry = self
            .registry
            .get(game_id)
            .ok_or_else(|| UpdateError::not_found(game_id.clone()))?;
        let index = entry
            .index_of(version)
            .ok_or_else(|| UpdateError::resource_not_found(game_id.clone(), version))?;
        let plan = plan_download_retry(&entry.resources[index], |h| self.engine.can_resume(h));
        self.apply_download_retry(game_id, entry.operation_id, index, &plan);
        Ok(())
    }

    /// Cancel a game's update: stop its transfers, drop the entry and clear
    /// staged artifacts. A cancelled first install also loses its target
    /// directory. Returns `false` when the game had no entry.
    pub async fn cancel(&self, game_id: &GameId) -> bool {
        let handles = self.reporter.report(game_id, |entry| {
            entry
                .resources
                .iter_mut()
                .filter(|r| {
                    !r.install.status.is_terminal_success()
                        && r.download.status != DownloadStatus::Completed
                })
                .filter_map(|r| {
                    r.download.status = DownloadStatus::Cancelled;
                    r.handle
                })
                .collect::<Vec<_>>()
        });
        let Some(handles) = handles else {
            return false;
        };

        for handle in &handles {
            self.engine.pause(*handle);
            self.engine.cancel(*handle);
        }

        let Some(entry) = self.registry.remove(game_id) else {
            return false;
        };
        self.reporter.push_list();

        let resources: Vec<_> = entry.resources.iter().map(|r| r.resource.clone()).collect();
        let layout = InstallLayout::for_entry(&entry);
        let mut staged = layout.staged_artifacts(&resources);
        if self.is_first_install(game_id, &entry).await {
            tracing::info!(
                target: "levelup.install",
                game_id = %game_id,
                target_dir = %layout.target().display(),
                "removing partial first install"
            );
            staged.push(layout.target().to_path_buf());
        }
        remove_staged(staged).await;

        tracing::info!(
            target: "levelup.download",
            game_id = %game_id,
            cancelled_transfers = handles.len(),
            "update cancelled"
        );
        true
    }

    /// Cancel every live update, e.g. on application quit.
    pub async fn cancel_all(&self) -> usize {
        let mut cancelled = 0;
        for game_id in self.registry.game_ids() {
            if self.cancel(&game_id).await {
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Drop a finished entry once the UI has shown its completion.
    ///
    /// Entries with any resource short of its terminal install state stay.
    pub fn acknowledge_finished(&self, game_id: &GameId) -> bool {
        let removed = self
            .registry
            .remove_if(game_id, UpdateEntry::is_finished)
            .is_some();
        if removed {
            self.reporter.push_list();
        }
        removed
    }

    /// Restart the earliest failed install and the earliest interrupted
    /// download of a game. Either may be absent; with neither, nothing
    /// happens.
    pub fn retry(self: &Arc<Self>, game_id: &GameId) -> RetryOutcome {
        let Some(entry) = self.registry.get(game_id) else {
            return RetryOutcome::default();
        };
        let operation_id = entry.operation_id;
        let mut outcome = RetryOutcome::default();

        if let Some(index) = find_first_erroring_install(&entry) {
            let version = entry.resources[index].version();
            if self.claim_install(game_id, operation_id) {
                tracing::info!(target: "levelup.retry", game_id = %game_id, %version, "retrying install");
                self.spawn_install_chain(game_id.clone(), operation_id, index);
                outcome.install = Some(version);
            } else {
                tracing::debug!(target: "levelup.retry", game_id = %game_id, "install already running");
            }
        }

        if let Some(index) = find_first_erroring_download(&entry) {
            let resource = &entry.resources[index];
            let plan = plan_download_retry(resource, |h| self.engine.can_resume(h));
            tracing::info!(target: "levelup.retry", game_id = %game_id, version = %resource.version(), plan = ?plan, "retrying download");
            self.apply_download_retry(game_id, operation_id, index, &plan);
            outcome.download = Some((resource.version(), plan));
        }

        outcome
    }

    pub fn snapshot(&self, game_id: &GameId) -> Option<UpdateProgressSnapshot> {
        self.registry.get(game_id).map(|entry| entry.snapshot())
    }

    pub fn snapshots(&self) -> Vec<UpdateProgressSnapshot> {
        self.registry.snapshots()
    }

    /// Reduce host events until the sending side closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<HostEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_host_event(event).await;
        }
        tracing::debug!(target: "levelup.download", "host event channel closed");
    }

    fn apply_download_retry(
        &self,
        game_id: &GameId,
        operation_id: Uuid,
        index: usize,
        plan: &DownloadRetry,
    ) {
        match plan {
            DownloadRetry::Resume(handle) => self.engine.resume(*handle),
            DownloadRetry::Restart(url) => {
                let reset = self.reporter.report_operation(game_id, operation_id, |entry| {
                    let resource = &mut entry.resources[index];
                    resource.handle = None;
                    resource.save_path = None;
                    resource.download.status = DownloadStatus::Initializing;
                    resource.download.interrupt_reason = InterruptReason::None;
                    resource.download.available_space_bytes = None;
                });
                if reset.is_some() {
                    self.engine.start_download(url, &self.settings.request_headers);
                }
            }
        }
    }

    /// Take the install flag of a game's entry.
    fn claim_install(&self, game_id: &GameId, operation_id: Uuid) -> bool {
        self.registry
            .with_operation(game_id, operation_id, |entry| {
                if entry.installing {
                    false
                } else {
                    entry.installing = true;
                    true
                }
            })
            .unwrap_or(false)
    }

    /// A full package was still pending and the game has no installed
    /// record, so the target holds nothing but this update's output.
    async fn is_first_install(&self, game_id: &GameId, entry: &UpdateEntry) -> bool {
        let pending_full_package = entry
            .resources
            .iter()
            .any(|r| r.resource.is_full_package && !r.install.status.is_terminal_success());
        if !pending_full_package {
            return false;
        }
        match self.game_info.get_game_info(game_id).await {
            Ok(record) => record.is_none(),
            Err(err) => {
                tracing::warn!(target: "levelup.install", game_id = %game_id, error = %err, "could not read game info; keeping target");
                false
            }
        }
    }

    /// Sample free space for `path` on the blocking pool.
    async fn sample_storage(&self, path: PathBuf) -> Option<StorageSample> {
        let storage = Arc::clone(&self.storage);
        match tokio::task::spawn_blocking(move || storage.sample(&path)).await {
            Ok(sample) => sample,
            Err(err) => {
                tracing::warn!(target: "levelup.download", error = %err, "storage probe failed");
                None
            }
        }
    }
}

/// Remove staged artifacts on the blocking pool; failures are logged.
async fn remove_staged(paths: Vec<PathBuf>) {
    if let Err(err) = tokio::task::spawn_blocking(move || levelup_install::remove_staged(&paths)).await
    {
        tracing::warn!(target: "levelup.install", error = %err, "staged artifact cleanup did not run");
    }
}
