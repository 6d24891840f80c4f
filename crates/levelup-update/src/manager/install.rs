//! Install chain: extract, patch, verify and register downloaded resources
//! in order.
//!
//! One loop per game walks the chain forward. Each step re-enters the
//! registry through the entry's operation id; when the entry is gone (a
//! cancel) or belongs to a newer start, the loop stops without writing.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use levelup_core::{
    DownloadStatus, GameId, InstallLayout, InstallState, InstallStatus, InternalVersion,
    LocalGameInfo, UnzipInterruptReason, UnzipProgress,
};
use levelup_install::{InstallError, add_files, extract_archive, read_manifest, remove_files};
use uuid::Uuid;

use super::{UpdateManager, remove_staged};

/// Everything one install needs, copied out of the entry up front.
struct InstallPlan {
    version: InternalVersion,
    is_full_package: bool,
    is_last: bool,
    save_path: PathBuf,
    extract_to: PathBuf,
    layout: InstallLayout,
    runnable: PathBuf,
    title: String,
    should_create_shortcut: bool,
}

/// How one resource's install ended.
enum Step {
    /// Reached `DeeplinkRegistered`; `next` is the resource to continue with.
    Installed {
        runnable: PathBuf,
        next: Option<usize>,
    },
    /// Stopped in a failure state; the install flag is released.
    Halted,
    /// The entry went away or never qualified.
    Aborted,
}

impl UpdateManager {
    /// Install `version` and every following resource that is ready, unless
    /// an install loop already runs for the game.
    ///
    /// Returns the absolute path of the game executable once at least one
    /// resource is installed. Returns `None` when the resource is missing,
    /// not yet downloaded, another loop owns the game, or the first install
    /// fails.
    pub async fn install_resource(
        self: &Arc<Self>,
        game_id: &GameId,
        version: InternalVersion,
    ) -> Option<PathBuf> {
        let (operation_id, index) = self
            .registry
            .with_entry(game_id, |entry| {
                let index = entry.index_of(version)?;
                let resource = &entry.resources[index];
                if entry.installing
                    || resource.save_path.is_none()
                    || resource.download.status != DownloadStatus::Completed
                {
                    return None;
                }
                entry.installing = true;
                Some((entry.operation_id, index))
            })
            .flatten()?;
        self.run_install_chain(game_id, operation_id, index).await
    }

    /// Run the install loop in the background. The caller has claimed the
    /// install flag.
    pub(super) fn spawn_install_chain(
        self: &Arc<Self>,
        game_id: GameId,
        operation_id: Uuid,
        index: usize,
    ) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_install_chain(&game_id, operation_id, index).await;
        });
    }

    async fn run_install_chain(
        &self,
        game_id: &GameId,
        operation_id: Uuid,
        mut index: usize,
    ) -> Option<PathBuf> {
        let mut runnable = None;
        loop {
            match self.install_one(game_id, operation_id, index).await {
                Step::Installed {
                    runnable: installed,
                    next,
                } => {
                    runnable.get_or_insert(installed);
                    match next {
                        Some(next) => index = next,
                        None => break,
                    }
                }
                Step::Halted | Step::Aborted => break,
            }
        }
        runnable
    }

    async fn install_one(&self, game_id: &GameId, operation_id: Uuid, index: usize) -> Step {
        let prepared = self
            .reporter
            .report_operation(game_id, operation_id, |entry| {
                let layout = InstallLayout::for_entry(entry);
                let is_last = entry.is_last(index);
                let runnable = layout.runnable(&entry.runnable_path);
                let title = entry.title.clone();
                let should_create_shortcut = entry.should_create_shortcut;

                let resource = entry.resources.get_mut(index)?;
                if resource.download.status != DownloadStatus::Completed {
                    return None;
                }
                let save_path = resource.save_path.clone()?;
                resource.install.status = InstallStatus::Unzipping;
                resource.install.unzip_progress =
                    UnzipProgress::initial(resource.resource.patch_size_bytes);

                let plan = InstallPlan {
                    version: resource.version(),
                    is_full_package: resource.is_full_package(),
                    is_last,
                    extract_to: layout.extraction_root(&resource.resource, &save_path),
                    save_path,
                    layout,
                    runnable,
                    title,
                    should_create_shortcut,
                };
                entry.focus(index);
                Some(plan)
            });
        let plan = match prepared {
            None => return Step::Aborted,
            Some(None) => {
                tracing::warn!(target: "levelup.install", game_id = %game_id, index, "resource is not ready to install");
                self.release(game_id, operation_id);
                return Step::Aborted;
            }
            Some(Some(plan)) => plan,
        };

        tracing::info!(
            target: "levelup.install",
            game_id = %game_id,
            version = %plan.version,
            archive = %plan.save_path.display(),
            "extracting"
        );
        let reporter = self.reporter.clone();
        let tracked = game_id.clone();
        let archive = plan.save_path.clone();
        let destination = plan.extract_to.clone();
        let extracted = blocking(&plan.save_path, move || {
            extract_archive(&archive, &destination, |progress| {
                reporter
                    .report_operation(&tracked, operation_id, |entry| {
                        entry.resources[index].install.unzip_progress = progress.clone();
                    })
                    .is_some()
            })
        })
        .await;
        let summary = match extracted {
            Ok(summary) => summary,
            Err(InstallError::Aborted) => {
                tracing::debug!(target: "levelup.install", game_id = %game_id, "extraction abandoned");
                return Step::Aborted;
            }
            Err(err) => {
                tracing::error!(target: "levelup.install", game_id = %game_id, version = %plan.version, error = %err, "extraction failed");
                self.halt(
                    game_id,
                    operation_id,
                    index,
                    InstallStatus::UnzipFailed,
                    Some(err.unzip_interrupt_reason()),
                );
                return Step::Halted;
            }
        };
        let unzipped = self.advance(game_id, operation_id, index, |install| {
            install.status = InstallStatus::UnzipSuccess;
            install.unzip_progress = summary.progress;
        });
        if !unzipped {
            return Step::Aborted;
        }

        if !plan.is_full_package {
            if let Err(step) = self
                .apply_patch(game_id, operation_id, index, &plan.layout)
                .await
            {
                return step;
            }
        }

        let is_file = tokio::fs::metadata(&plan.runnable)
            .await
            .is_ok_and(|meta| meta.is_file());
        if !is_file {
            tracing::error!(
                target: "levelup.install",
                game_id = %game_id,
                runnable = %plan.runnable.display(),
                "game executable missing after install"
            );
            self.halt(game_id, operation_id, index, InstallStatus::InvalidFile, None);
            return Step::Halted;
        }
        if !self.set_status(game_id, operation_id, index, InstallStatus::ValidFile) {
            return Step::Aborted;
        }

        self.record_game_info(game_id, &plan).await;
        if plan.should_create_shortcut {
            if let Err(err) =
                self.shortcuts
                    .create_shortcut(&plan.title, game_id.as_str(), &plan.runnable)
            {
                tracing::warn!(target: "levelup.install", game_id = %game_id, error = %err, "shortcut not created");
            }
        }
        if !self.set_status(game_id, operation_id, index, InstallStatus::GameInfoSet) {
            return Step::Aborted;
        }

        let protocol = self.settings.protocol_for(game_id.as_str());
        if let Err(err) = self.protocols.register(&protocol, &plan.runnable) {
            tracing::warn!(target: "levelup.install", game_id = %game_id, %protocol, error = %err, "protocol not registered");
        }
        if !self.set_status(game_id, operation_id, index, InstallStatus::DeeplinkRegistered) {
            return Step::Aborted;
        }

        let mut staged = Vec::new();
        if plan.is_full_package {
            staged.push(plan.save_path.clone());
        }
        if plan.is_last {
            staged.push(plan.layout.patch_workspace());
        }
        if !staged.is_empty() {
            remove_staged(staged).await;
        }

        let next = self
            .registry
            .with_operation(game_id, operation_id, |entry| {
                let next = entry.next_installable(index);
                if next.is_none() {
                    entry.installing = false;
                }
                next
            })
            .flatten();
        tracing::info!(
            target: "levelup.install",
            game_id = %game_id,
            version = %plan.version,
            next = ?next,
            "resource installed"
        );
        Step::Installed {
            runnable: plan.runnable,
            next,
        }
    }

    /// Remove and add the files listed in the extracted diff manifest.
    async fn apply_patch(
        &self,
        game_id: &GameId,
        operation_id: Uuid,
        index: usize,
        layout: &InstallLayout,
    ) -> Result<(), Step> {
        let metadata = layout.patch_metadata();
        let content = layout.patch_content();
        let target = layout.target().to_path_buf();

        let manifest_path = metadata.clone();
        let manifest = match blocking(&metadata, move || read_manifest(&manifest_path)).await {
            Ok(manifest) => Arc::new(manifest),
            Err(err) => {
                tracing::error!(target: "levelup.install", game_id = %game_id, error = %err, "unreadable diff manifest");
                self.halt(
                    game_id,
                    operation_id,
                    index,
                    InstallStatus::UnzipFailed,
                    Some(UnzipInterruptReason::Unknown),
                );
                return Err(Step::Halted);
            }
        };

        if !self.set_status(game_id, operation_id, index, InstallStatus::RemovingFiles) {
            return Err(Step::Aborted);
        }
        let (root, listed) = (target.clone(), Arc::clone(&manifest));
        match blocking(&target, move || Ok(remove_files(&root, &listed))).await {
            Ok(report) => {
                tracing::info!(
                    target: "levelup.install",
                    game_id = %game_id,
                    removed = report.removed.len(),
                    missing = report.missing.len(),
                    failed = report.failed.len(),
                    "obsolete files removed"
                );
            }
            Err(err) => {
                tracing::error!(target: "levelup.install", game_id = %game_id, error = %err, "removing files failed");
                self.halt(game_id, operation_id, index, InstallStatus::RemovingFilesFailed, None);
                return Err(Step::Halted);
            }
        }

        if !self.set_status(game_id, operation_id, index, InstallStatus::AddingFiles) {
            return Err(Step::Aborted);
        }
        let (source, root) = (content.clone(), target.clone());
        match blocking(&target, move || Ok(add_files(&source, &root, &manifest))).await {
            Ok(report)
                if self.settings.strict_hash_verification && !report.hash_mismatches.is_empty() =>
            {
                tracing::error!(
                    target: "levelup.install",
                    game_id = %game_id,
                    mismatches = report.hash_mismatches.len(),
                    "patched files failed verification"
                );
                self.halt(game_id, operation_id, index, InstallStatus::AddingFilesFailed, None);
                return Err(Step::Halted);
            }
            Ok(report) => {
                tracing::info!(
                    target: "levelup.install",
                    game_id = %game_id,
                    added = report.added.len(),
                    mismatches = report.hash_mismatches.len(),
                    failed = report.failed.len(),
                    "patched files added"
                );
            }
            Err(err) => {
                tracing::error!(target: "levelup.install", game_id = %game_id, error = %err, "adding files failed");
                self.halt(game_id, operation_id, index, InstallStatus::AddingFilesFailed, None);
                return Err(Step::Halted);
            }
        }

        remove_staged(vec![content, metadata]).await;
        Ok(())
    }

    async fn record_game_info(&self, game_id: &GameId, plan: &InstallPlan) {
        let existing = match self.game_info.get_game_info(game_id).await {
            Ok(info) => info,
            Err(err) => {
                tracing::warn!(target: "levelup.install", game_id = %game_id, error = %err, "could not read game info");
                None
            }
        };
        let info = LocalGameInfo::installed(
            existing.as_ref(),
            plan.runnable.clone(),
            plan.layout.target().to_path_buf(),
            plan.version,
        );
        if let Err(err) = self.game_info.set_game_info(game_id, info).await {
            tracing::error!(target: "levelup.install", game_id = %game_id, error = %err, "could not save game info");
        }
    }

    /// Mutate the install state of `index`; `false` once the operation is gone.
    fn advance(
        &self,
        game_id: &GameId,
        operation_id: Uuid,
        index: usize,
        f: impl FnOnce(&mut InstallState),
    ) -> bool {
        self.reporter
            .report_operation(game_id, operation_id, |entry| {
                entry.focus(index);
                f(&mut entry.resources[index].install);
            })
            .is_some()
    }

    fn set_status(
        &self,
        game_id: &GameId,
        operation_id: Uuid,
        index: usize,
        status: InstallStatus,
    ) -> bool {
        self.advance(game_id, operation_id, index, |install| install.status = status)
    }

    /// Record a failure and release the install flag in the same write.
    fn halt(
        &self,
        game_id: &GameId,
        operation_id: Uuid,
        index: usize,
        status: InstallStatus,
        reason: Option<UnzipInterruptReason>,
    ) {
        self.reporter.report_operation(game_id, operation_id, |entry| {
            let install = &mut entry.resources[index].install;
            install.status = status;
            if let Some(reason) = reason {
                install.unzip_progress.interrupt_reason = reason;
            }
            entry.installing = false;
        });
    }

    fn release(&self, game_id: &GameId, operation_id: Uuid) {
        self.registry.with_operation(game_id, operation_id, |entry| {
            entry.installing = false;
        });
    }
}

/// Run filesystem work on the blocking pool.
async fn blocking<T, F>(path: &Path, f: F) -> Result<T, InstallError>
where
    F: FnOnce() -> Result<T, InstallError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| InstallError::io(path, io::Error::other(err)))?
}
