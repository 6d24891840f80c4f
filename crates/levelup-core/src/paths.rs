//! On-disk layout of an install directory during an update.
//!
//! ```text
//! {target}/
//!   {full-package}.zip                      staged full package
//!   .levelup-patch/                         patch workspace
//!     {patch}.zip                           staged incremental archive
//!     .levelup-patch-content/               extracted patch payload
//!     .levelup-patch.metadata.json          extracted diff manifest
//! ```

use std::path::{Path, PathBuf};

use crate::domain::{Resource, UpdateEntry};

/// Scratch directory for incremental resources.
pub const PATCH_WORKSPACE_DIR: &str = ".levelup-patch";
/// Payload directory inside an incremental archive.
pub const PATCH_CONTENT_DIR: &str = ".levelup-patch-content";
/// Diff manifest inside an incremental archive.
pub const PATCH_METADATA_FILE: &str = ".levelup-patch.metadata.json";

/// Paths derived from a game's target directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    target: PathBuf,
}

impl InstallLayout {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }

    #[must_use]
    pub fn for_entry(entry: &UpdateEntry) -> Self {
        Self::new(entry.target_directory.clone())
    }

    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    #[must_use]
    pub fn patch_workspace(&self) -> PathBuf {
        self.target.join(PATCH_WORKSPACE_DIR)
    }

    #[must_use]
    pub fn patch_content(&self) -> PathBuf {
        self.patch_workspace().join(PATCH_CONTENT_DIR)
    }

    #[must_use]
    pub fn patch_metadata(&self) -> PathBuf {
        self.patch_workspace().join(PATCH_METADATA_FILE)
    }

    /// Where the host engine should save a resource's archive.
    #[must_use]
    pub fn save_path(&self, resource: &Resource) -> PathBuf {
        let dir = if resource.is_full_package {
            self.target.clone()
        } else {
            self.patch_workspace()
        };
        dir.join(resource.file_name())
    }

    /// Directory an archive saved at `save_path` is extracted into.
    #[must_use]
    pub fn extraction_root(&self, resource: &Resource, save_path: &Path) -> PathBuf {
        if resource.is_full_package {
            save_path
                .parent()
                .map_or_else(|| self.target.clone(), Path::to_path_buf)
        } else {
            self.patch_workspace()
        }
    }

    /// Absolute path of the game executable.
    #[must_use]
    pub fn runnable(&self, relative: &Path) -> PathBuf {
        self.target.join(relative)
    }

    /// Staged artifacts a fresh start or a cancel clears: full-package
    /// archives and the patch workspace.
    #[must_use]
    pub fn staged_artifacts(&self, resources: &[Resource]) -> Vec<PathBuf> {
        resources
            .iter()
            .filter(|r| r.is_full_package)
            .map(|r| self.save_path(r))
            .chain(std::iter::once(self.patch_workspace()))
            .collect()
    }
}
