//! Registry entries: one `UpdateEntry` per game with an in-flight update.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::resource::{GameId, InternalVersion, Resource, UpdateRequest};
use super::state::{DownloadState, DownloadStatus, InstallState};
use crate::events::{ResourceSnapshot, UpdateProgressSnapshot};
use crate::host::DownloadHandle;

/// Tracking state of one resource in the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    pub resource: Resource,
    pub download: DownloadState,
    pub install: InstallState,
    /// URL handed to the host engine.
    pub download_url: String,
    /// Host engine item, bound once the engine attaches the download.
    #[serde(skip)]
    pub handle: Option<DownloadHandle>,
    /// Where the host engine writes the archive.
    pub save_path: Option<PathBuf>,
}

impl ResourceEntry {
    #[must_use]
    pub fn new(resource: Resource) -> Self {
        let size = resource.patch_size_bytes;
        Self {
            download_url: resource.patch_url.clone(),
            download: DownloadState::initial(size),
            install: InstallState::initial(size),
            handle: None,
            save_path: None,
            resource,
        }
    }

    #[must_use]
    pub const fn is_full_package(&self) -> bool {
        self.resource.is_full_package
    }

    #[must_use]
    pub const fn version(&self) -> InternalVersion {
        self.resource.internal_version
    }

    /// Downloaded, saved, and not yet picked up by the install pipeline.
    #[must_use]
    pub fn awaits_install(&self) -> bool {
        self.download.status == DownloadStatus::Completed
            && self.save_path.is_some()
            && self.install.status.is_pending()
    }

    fn snapshot(&self) -> ResourceSnapshot {
        ResourceSnapshot {
            internal_version: self.resource.internal_version,
            is_full_package: self.resource.is_full_package,
            download: self.download.clone(),
            install: self.install.clone(),
        }
    }
}

/// Root aggregate of one game's update operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEntry {
    /// Identity of this particular start; a cancel followed by a new start
    /// yields a different id for the same game.
    pub operation_id: Uuid,
    pub game_id: GameId,
    pub title: String,
    pub target_directory: PathBuf,
    pub runnable_path: PathBuf,
    pub should_create_shortcut: bool,
    pub download_init_time: DateTime<Utc>,
    pub resources: Vec<ResourceEntry>,
    /// Resource the UI shows progress for.
    pub current_index: usize,
    /// Set while an install loop owns this entry.
    #[serde(skip)]
    pub installing: bool,
}

impl UpdateEntry {
    /// Build a fresh entry from a validated request.
    #[must_use]
    pub fn new(request: UpdateRequest, download_init_time: DateTime<Utc>) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            game_id: request.game_id,
            title: request.title,
            target_directory: request.target_directory,
            runnable_path: request.runnable_path,
            should_create_shortcut: request.should_create_shortcut,
            download_init_time,
            resources: request
                .resources
                .into_iter()
                .map(ResourceEntry::new)
                .collect(),
            current_index: 0,
            installing: false,
        }
    }

    #[must_use]
    pub fn index_of(&self, version: InternalVersion) -> Option<usize> {
        self.resources
            .iter()
            .position(|r| r.resource.internal_version == version)
    }

    #[must_use]
    pub fn index_of_handle(&self, handle: DownloadHandle) -> Option<usize> {
        self.resources.iter().position(|r| r.handle == Some(handle))
    }

    /// Resource whose download URL prefixes `url`; the last match wins.
    #[must_use]
    pub fn index_for_url(&self, url: &str) -> Option<usize> {
        self.resources
            .iter()
            .rposition(|r| url.starts_with(r.download_url.as_str()))
    }

    #[must_use]
    pub fn is_last(&self, index: usize) -> bool {
        index + 1 >= self.resources.len()
    }

    /// Whether the install of resource `index` may begin given its predecessor.
    #[must_use]
    pub fn can_start_install(&self, index: usize) -> bool {
        index == 0
            || self
                .resources
                .get(index - 1)
                .is_some_and(|prev| prev.install.status.unblocks_next())
    }

    /// Every resource has reached its terminal install state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.resources
            .iter()
            .all(|r| r.install.status.is_terminal_success())
    }

    /// Point the UI at `index` unless that resource is already fully installed.
    pub fn focus(&mut self, index: usize) {
        if self
            .resources
            .get(index)
            .is_some_and(|r| !r.install.status.is_terminal_success())
        {
            self.current_index = index;
        }
    }

    /// Next resource ready for the install loop once `index` finished.
    #[must_use]
    pub fn next_installable(&self, index: usize) -> Option<usize> {
        let next = index + 1;
        self.resources
            .get(next)
            .filter(|r| r.awaits_install() && self.can_start_install(next))
            .map(|_| next)
    }

    /// Serialisable view for the UI.
    #[must_use]
    pub fn snapshot(&self) -> UpdateProgressSnapshot {
        UpdateProgressSnapshot {
            operation_id: self.operation_id,
            game_id: self.game_id.clone(),
            title: self.title.clone(),
            download_init_time: self.download_init_time,
            current_index: self.current_index,
            is_finished: self.is_finished(),
            resources: self.resources.iter().map(ResourceEntry::snapshot).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::state::InstallStatus;

    fn request(versions: &[u64]) -> UpdateRequest {
        UpdateRequest {
            game_id: GameId::new("g"),
            title: "Game".into(),
            target_directory: PathBuf::from("/games/g"),
            runnable_path: PathBuf::from("game.exe"),
            should_create_shortcut: true,
            resources: versions
                .iter()
                .map(|v| Resource {
                    internal_version: InternalVersion::Number(*v),
                    is_full_package: false,
                    patch_url: format!("https://cdn/{v}.zip"),
                    patch_metadata_url: format!("https://cdn/{v}.json"),
                    patch_size_bytes: 100,
                })
                .collect(),
        }
    }

    #[test]
    fn test_new_entry_seeds_states() {
        let entry = UpdateEntry::new(request(&[4, 5]), Utc::now());
        assert_eq!(entry.resources.len(), 2);
        assert_eq!(entry.current_index, 0);
        assert_eq!(entry.resources[1].download.total_bytes, 100);
        assert_eq!(
            entry.resources[1].install.status,
            InstallStatus::Downloading
        );
        assert!(!entry.is_finished());
    }

    #[test]
    fn test_url_matching_uses_prefix_and_last_match() {
        let mut entry = UpdateEntry::new(request(&[4, 5]), Utc::now());
        entry.resources[1].download_url = "https://cdn/".into();
        assert_eq!(entry.index_for_url("https://cdn/4.zip?token=1"), Some(1));
        assert_eq!(entry.index_for_url("https://other/4.zip"), None);
    }

    #[test]
    fn test_install_eligibility_follows_predecessor() {
        let mut entry = UpdateEntry::new(request(&[4, 5]), Utc::now());
        assert!(entry.can_start_install(0));
        assert!(!entry.can_start_install(1));
        entry.resources[0].install.status = InstallStatus::AddingFiles;
        assert!(!entry.can_start_install(1));
        entry.resources[0].install.status = InstallStatus::ValidFile;
        assert!(entry.can_start_install(1));
    }

    #[test]
    fn test_focus_skips_finished_resources() {
        let mut entry = UpdateEntry::new(request(&[4, 5]), Utc::now());
        entry.resources[1].install.status = InstallStatus::DeeplinkRegistered;
        entry.focus(1);
        assert_eq!(entry.current_index, 0);
        entry.resources[1].install.status = InstallStatus::Unzipping;
        entry.focus(1);
        assert_eq!(entry.current_index, 1);
    }

    #[test]
    fn test_next_installable_requires_completed_download() {
        let mut entry = UpdateEntry::new(request(&[4, 5]), Utc::now());
        entry.resources[0].install.status = InstallStatus::DeeplinkRegistered;
        assert_eq!(entry.next_installable(0), None);
        entry.resources[1].download.status = DownloadStatus::Completed;
        entry.resources[1].save_path = Some(PathBuf::from("/tmp/5.zip"));
        assert_eq!(entry.next_installable(0), Some(1));
        assert_eq!(entry.next_installable(1), None);
    }
}
