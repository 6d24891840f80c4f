//! Diff manifest shipped inside incremental archives.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path};

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::UpdateError;

/// Files an incremental resource adds and removes, relative to the install root.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiffManifest {
    /// Relative path to lowercase hex SHA-256 of the new content.
    #[serde(default)]
    pub added: BTreeMap<String, String>,
    /// Relative paths to delete.
    #[serde(default, deserialize_with = "removed_paths")]
    pub removed: BTreeSet<String>,
}

/// Publishers emit `removed` either as a list of paths or as a
/// path-to-checksum map; only the paths matter.
fn removed_paths<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Removed {
        List(Vec<String>),
        Map(BTreeMap<String, serde_json::Value>),
    }

    Ok(match Removed::deserialize(deserializer)? {
        Removed::List(paths) => paths.into_iter().collect(),
        Removed::Map(map) => map.into_keys().collect(),
    })
}

impl DiffManifest {
    /// Parse and validate a manifest document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, UpdateError> {
        let manifest: Self =
            serde_json::from_slice(bytes).map_err(|e| UpdateError::manifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reject entries that would escape the install directory.
    pub fn validate(&self) -> Result<(), UpdateError> {
        let unsafe_path = self
            .added
            .keys()
            .chain(self.removed.iter())
            .find(|path| !is_safe_relative(path));
        if let Some(path) = unsafe_path {
            return Err(UpdateError::manifest(format!(
                "path escapes install directory: {path}"
            )));
        }
        Ok(())
    }
}

fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_accepts_list_or_map() {
        let list = DiffManifest::from_json(br#"{"added":{},"removed":["a.txt","b/c.dat"]}"#)
            .unwrap();
        let map = DiffManifest::from_json(
            br#"{"added":{},"removed":{"a.txt":"00ff","b/c.dat":"aa11"}}"#,
        )
        .unwrap();
        assert_eq!(list.removed, map.removed);
        assert!(list.removed.contains("b/c.dat"));
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let manifest = DiffManifest::from_json(br#"{"added":{"x.bin":"ab"}}"#).unwrap();
        assert!(manifest.removed.is_empty());
        assert_eq!(manifest.added["x.bin"], "ab");
    }

    #[test]
    fn test_rejects_escaping_paths() {
        assert!(DiffManifest::from_json(br#"{"added":{"../evil":"ab"}}"#).is_err());
        assert!(DiffManifest::from_json(br#"{"removed":["/etc/passwd"]}"#).is_err());
        assert!(DiffManifest::from_json(b"not json").is_err());
    }
}
