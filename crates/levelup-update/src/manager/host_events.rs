//! Reduction of host download events into registry state.

use std::path::PathBuf;
use std::sync::Arc;

use levelup_core::{
    DoneState, DownloadHandle, DownloadState, DownloadStatus, GameId, HostEvent, InstallLayout,
    InstallStatus, InterruptReason, TransferProgress, TransferState, UpdateEntry,
};
use uuid::Uuid;

use super::UpdateManager;
use crate::retry::{classify_failure, classify_interruption};

/// What a completed download unlocked, decided under the registry lock.
struct Completion {
    operation_id: Uuid,
    next_url: Option<String>,
    start_install: bool,
}

impl UpdateManager {
    /// Apply one host event.
    ///
    /// Events for handles or URLs the registry does not know are dropped;
    /// they belong to cancelled or foreign transfers.
    pub async fn handle_host_event(self: &Arc<Self>, event: HostEvent) {
        tracing::trace!(target: "levelup.events", event = event.event_name(), "host event");
        match event {
            HostEvent::Attached { handle, url } => self.on_attached(handle, &url).await,
            HostEvent::Updated {
                handle,
                state,
                progress,
            } => self.on_updated(handle, state, &progress).await,
            HostEvent::Done {
                handle,
                state,
                progress,
            } => self.on_done(handle, state, &progress).await,
            HostEvent::RequestFailed { url, error_code } => {
                self.on_request_failed(&url, &error_code);
            }
        }
    }

    async fn on_attached(&self, handle: DownloadHandle, url: &str) {
        let Some((game_id, index)) = self.registry.find_by_url(url) else {
            tracing::warn!(target: "levelup.download", %handle, %url, "rejecting unmanaged download");
            self.engine.reject(handle);
            return;
        };

        let save_path = self.reporter.report(&game_id, |entry| {
            let layout = InstallLayout::for_entry(entry);
            entry.focus(index);
            let resource = &mut entry.resources[index];
            let path = layout.save_path(&resource.resource);
            resource.handle = Some(handle);
            resource.save_path = Some(path.clone());
            path
        });
        let Some(save_path) = save_path else {
            self.engine.reject(handle);
            return;
        };

        if let Some(parent) = save_path.parent() {
            if let Err(err) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(
                    target: "levelup.download",
                    path = %parent.display(),
                    error = %err,
                    "failed to create download directory"
                );
            }
        }

        tracing::debug!(
            target: "levelup.download",
            game_id = %game_id,
            %handle,
            path = %save_path.display(),
            "download attached"
        );
        self.engine.set_save_path(handle, &save_path);
        self.reporter.push_list();
    }

    async fn on_updated(
        &self,
        handle: DownloadHandle,
        state: TransferState,
        progress: &TransferProgress,
    ) {
        let Some((game_id, index)) = self.registry.find_by_handle(handle) else {
            tracing::debug!(target: "levelup.download", %handle, "progress for unknown handle");
            return;
        };

        match state {
            TransferState::Progressing => {
                self.reporter.report(&game_id, |entry| {
                    entry.focus(index);
                    let download = &mut entry.resources[index].download;
                    if download.status == DownloadStatus::Cancelled {
                        return;
                    }
                    apply(download, progress);
                    download.status = DownloadStatus::Progressing;
                    download.interrupt_reason = if progress.is_paused {
                        InterruptReason::Pause
                    } else {
                        InterruptReason::None
                    };
                    download.available_space_bytes = None;
                });
            }
            TransferState::Interrupted => {
                let Some(probe_path) = self.mark_interrupted(&game_id, index, Some(progress))
                else {
                    return;
                };
                let sample = self.sample_storage(probe_path).await;
                let threshold = self.settings.free_space_threshold_bytes;
                self.reporter.report(&game_id, |entry| {
                    let download = &mut entry.resources[index].download;
                    download.available_space_bytes = sample.map(|s| s.available_bytes);
                    download.interrupt_reason = classify_interruption(
                        progress.is_paused,
                        sample,
                        threshold,
                        &download.interrupt_reason,
                    );
                    tracing::warn!(
                        target: "levelup.download",
                        game_id = %entry.game_id,
                        %handle,
                        reason = %download.interrupt_reason,
                        "download interrupted"
                    );
                });
            }
        }
    }

    async fn on_done(
        self: &Arc<Self>,
        handle: DownloadHandle,
        state: DoneState,
        progress: &TransferProgress,
    ) {
        let Some((game_id, index)) = self.registry.find_by_handle(handle) else {
            tracing::debug!(target: "levelup.download", %handle, "completion for unknown handle");
            return;
        };

        match state {
            DoneState::Completed => self.on_completed(&game_id, index, progress),
            DoneState::Cancelled => {
                self.reporter.report(&game_id, |entry| {
                    entry.resources[index].download.status = DownloadStatus::Cancelled;
                });
            }
            DoneState::Interrupted => {
                let Some(probe_path) = self.mark_interrupted(&game_id, index, None) else {
                    return;
                };
                let sample = self.sample_storage(probe_path).await;
                let threshold = self.settings.free_space_threshold_bytes;
                self.reporter.report(&game_id, |entry| {
                    let download = &mut entry.resources[index].download;
                    download.available_space_bytes = sample.map(|s| s.available_bytes);
                    download.interrupt_reason =
                        classify_failure(sample, threshold, &download.interrupt_reason);
                    tracing::error!(
                        target: "levelup.download",
                        game_id = %entry.game_id,
                        %handle,
                        reason = %download.interrupt_reason,
                        "download failed"
                    );
                });
            }
        }
    }

    fn on_completed(self: &Arc<Self>, game_id: &GameId, index: usize, progress: &TransferProgress) {
        let settings = &self.settings;
        let completion = self.reporter.report(game_id, |entry| {
            let resource = &mut entry.resources[index];
            if resource.download.status == DownloadStatus::Cancelled {
                return None;
            }
            let is_archive = resource
                .save_path
                .as_ref()
                .is_some_and(|path| settings.is_archive(&path.to_string_lossy()));
            if !is_archive {
                tracing::error!(
                    target: "levelup.download",
                    game_id = %entry.game_id,
                    save_path = ?resource.save_path,
                    "completed download is not an archive"
                );
                return None;
            }

            apply(&mut resource.download, progress);
            resource.download.status = DownloadStatus::Completed;
            resource.download.percent = 100.0;
            resource.download.interrupt_reason = InterruptReason::None;
            resource.download.available_space_bytes = None;
            entry.focus(index);

            Some(Completion {
                operation_id: entry.operation_id,
                next_url: next_download(entry, index),
                start_install: queue_install(entry, index),
            })
        });
        let Some(Some(completion)) = completion else {
            return;
        };

        tracing::info!(target: "levelup.download", game_id = %game_id, index, "download completed");
        if let Some(url) = completion.next_url {
            self.engine.start_download(&url, &self.settings.request_headers);
        }
        if completion.start_install {
            self.spawn_install_chain(game_id.clone(), completion.operation_id, index);
        }
    }

    fn on_request_failed(&self, url: &str, error_code: &str) {
        if self.settings.is_ignored_error(error_code) || !self.settings.is_archive(url) {
            tracing::debug!(target: "levelup.download", %url, %error_code, "request failure ignored");
            return;
        }
        tracing::error!(target: "levelup.download", %url, %error_code, "archive request failed");

        let Some((game_id, index)) = self.registry.find_by_url(url) else {
            return;
        };
        self.reporter.report(&game_id, |entry| {
            let resource = &mut entry.resources[index];
            resource.download.interrupt_reason = InterruptReason::server_error(error_code);
            if resource.handle.is_none() {
                resource.download.status = DownloadStatus::Interrupted;
            }
        });
    }

    /// Mark a transfer interrupted and return the path whose volume should
    /// be probed for free space.
    fn mark_interrupted(
        &self,
        game_id: &GameId,
        index: usize,
        progress: Option<&TransferProgress>,
    ) -> Option<PathBuf> {
        self.reporter
            .report(game_id, |entry| {
                entry.focus(index);
                let target = entry.target_directory.clone();
                let resource = &mut entry.resources[index];
                if resource.download.status == DownloadStatus::Cancelled {
                    return None;
                }
                if let Some(progress) = progress {
                    apply(&mut resource.download, progress);
                }
                resource.download.status = DownloadStatus::Interrupted;
                Some(resource.save_path.clone().unwrap_or(target))
            })
            .flatten()
    }
}

fn apply(download: &mut DownloadState, progress: &TransferProgress) {
    download.apply_progress(
        progress.received_bytes,
        progress.total_bytes,
        progress.bytes_per_second,
        progress.percent,
        progress.is_paused,
    );
}

/// URL of the next resource if it has not been requested yet.
fn next_download(entry: &UpdateEntry, index: usize) -> Option<String> {
    entry
        .resources
        .get(index + 1)
        .filter(|next| next.handle.is_none() && next.download.status == DownloadStatus::Initializing)
        .map(|next| next.download_url.clone())
}

/// Move a completed resource to `Downloaded` when its predecessor allows
/// it, and claim the install flag if no loop is running.
fn queue_install(entry: &mut UpdateEntry, index: usize) -> bool {
    let unblocked = entry.can_start_install(index);
    let resource = &mut entry.resources[index];
    if !unblocked || !resource.install.status.is_pending() {
        return false;
    }
    resource.install.status = InstallStatus::Downloaded;
    if entry.installing {
        return false;
    }
    entry.installing = true;
    true
}
