use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::resource::InternalVersion;

/// What the launcher remembers about an installed game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalGameInfo {
    /// Absolute path of the executable.
    pub runnable_path: PathBuf,
    /// Directory the game was first installed into.
    pub root_folder_path: PathBuf,
    /// Build currently on disk.
    pub internal_version: InternalVersion,
}

impl LocalGameInfo {
    /// Record for a freshly installed build, keeping the root folder of an
    /// earlier record when one exists.
    #[must_use]
    pub fn installed(
        existing: Option<&Self>,
        runnable_path: PathBuf,
        target_directory: PathBuf,
        internal_version: InternalVersion,
    ) -> Self {
        Self {
            runnable_path,
            root_folder_path: existing.map_or(target_directory, |info| info.root_folder_path.clone()),
            internal_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installed_keeps_existing_root() {
        let first = LocalGameInfo::installed(
            None,
            PathBuf::from("/games/a/a.exe"),
            PathBuf::from("/games/a"),
            InternalVersion::Legacy,
        );
        assert_eq!(first.root_folder_path, PathBuf::from("/games/a"));

        let second = LocalGameInfo::installed(
            Some(&first),
            PathBuf::from("/moved/a/a.exe"),
            PathBuf::from("/moved/a"),
            InternalVersion::Number(2),
        );
        assert_eq!(second.root_folder_path, PathBuf::from("/games/a"));
        assert_eq!(second.internal_version, InternalVersion::Number(2));

        let json = serde_json::to_value(&first).unwrap();
        assert_eq!(json["internalVersion"], "legacy");
        assert!(json.get("rootFolderPath").is_some());
    }
}
