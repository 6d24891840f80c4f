//! Downloadable resources and the update request that sequences them.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::UpdateError;

/// Bytes in one mebibyte, the unit remote descriptions use for patch sizes.
const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Identifier of a game in the launcher catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    /// Create a game identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for GameId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Build number of a game release.
///
/// Installs that predate numbered builds carry the `legacy` sentinel, which
/// serialises as the bare string `"legacy"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "VersionRepr", into = "VersionRepr")]
pub enum InternalVersion {
    /// Pre-versioning install.
    Legacy,
    /// Numbered build.
    Number(u64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum VersionRepr {
    Number(u64),
    Text(String),
}

impl TryFrom<VersionRepr> for InternalVersion {
    type Error = String;

    fn try_from(value: VersionRepr) -> Result<Self, Self::Error> {
        match value {
            VersionRepr::Number(n) => Ok(Self::Number(n)),
            VersionRepr::Text(text) if text == "legacy" => Ok(Self::Legacy),
            VersionRepr::Text(text) => text
                .parse()
                .map(Self::Number)
                .map_err(|_| format!("invalid internal version: {text}")),
        }
    }
}

impl From<InternalVersion> for VersionRepr {
    fn from(value: InternalVersion) -> Self {
        match value {
            InternalVersion::Legacy => Self::Text("legacy".to_string()),
            InternalVersion::Number(n) => Self::Number(n),
        }
    }
}

impl fmt::Display for InternalVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// One downloadable unit of an update chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Build this resource brings the install to.
    pub internal_version: InternalVersion,
    /// Whether this is a complete package rather than a diff.
    pub is_full_package: bool,
    /// URL of the archive.
    pub patch_url: String,
    /// URL of the diff manifest published next to the archive.
    pub patch_metadata_url: String,
    /// Advertised archive size.
    pub patch_size_bytes: u64,
}

impl Resource {
    /// Last path segment of the archive URL, without query or fragment.
    ///
    /// Falls back to `{version}.zip` when the URL has no usable segment.
    #[must_use]
    pub fn file_name(&self) -> String {
        let without_query = self
            .patch_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        match without_query.rsplit('/').next() {
            Some(name) if !name.is_empty() && !name.contains(':') => name.to_string(),
            _ => format!("{}.zip", self.internal_version),
        }
    }
}

/// Wire description of a remote asset (archive or manifest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAsset {
    /// Advertised MIME type.
    #[serde(default)]
    pub mime_type: String,
    /// Download URL.
    pub url: String,
}

/// Wire description of one resource as published by the update service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteResource {
    pub internal_version: InternalVersion,
    pub patch: RemoteAsset,
    pub patch_metadata: RemoteAsset,
    /// Archive size in mebibytes.
    #[serde(default)]
    pub patch_size: f64,
    #[serde(default)]
    pub is_full_package: bool,
}

impl From<RemoteResource> for Resource {
    fn from(remote: RemoteResource) -> Self {
        let bytes = (remote.patch_size.max(0.0) * BYTES_PER_MIB).round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let patch_size_bytes = bytes as u64;
        Self {
            internal_version: remote.internal_version,
            is_full_package: remote.is_full_package,
            patch_url: remote.patch.url,
            patch_metadata_url: remote.patch_metadata.url,
            patch_size_bytes,
        }
    }
}

/// Remote description of everything needed to bring a game up to date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUpdateInfo {
    pub resources: Vec<RemoteResource>,
}

impl RemoteUpdateInfo {
    /// Parse the JSON document served by the update service.
    pub fn from_json(bytes: &[u8]) -> Result<Self, UpdateError> {
        serde_json::from_slice(bytes).map_err(|e| UpdateError::manifest(e.to_string()))
    }

    /// Convert into the ordered resource list.
    #[must_use]
    pub fn into_resources(self) -> Vec<Resource> {
        self.resources.into_iter().map(Resource::from).collect()
    }
}

/// Everything the orchestrator needs to start an update for one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub game_id: GameId,
    /// Display title, used for the desktop shortcut.
    pub title: String,
    /// Directory the game is (or will be) installed into.
    pub target_directory: PathBuf,
    /// Executable path relative to `target_directory`.
    pub runnable_path: PathBuf,
    pub should_create_shortcut: bool,
    /// Ordered resources; index 0 is applied first.
    pub resources: Vec<Resource>,
}

impl UpdateRequest {
    /// Check the ordering constraints of the resource chain.
    pub fn validate(&self) -> Result<(), UpdateError> {
        if self.resources.is_empty() {
            return Err(UpdateError::invalid_request(format!(
                "update for {} has no resources",
                self.game_id
            )));
        }
        if self
            .resources
            .iter()
            .skip(1)
            .any(|resource| resource.is_full_package)
        {
            return Err(UpdateError::invalid_request(format!(
                "update for {} has a full package after the first resource",
                self.game_id
            )));
        }
        if self.runnable_path.is_absolute() {
            return Err(UpdateError::invalid_request(
                "runnable path must be relative to the target directory",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(version: u64, full: bool) -> Resource {
        Resource {
            internal_version: InternalVersion::Number(version),
            is_full_package: full,
            patch_url: format!("https://cdn.example.com/games/7/{version}.zip?sig=abc"),
            patch_metadata_url: format!("https://cdn.example.com/games/7/{version}.json"),
            patch_size_bytes: 10,
        }
    }

    fn request(resources: Vec<Resource>) -> UpdateRequest {
        UpdateRequest {
            game_id: GameId::new("7"),
            title: "Seven".into(),
            target_directory: PathBuf::from("/games/seven"),
            runnable_path: PathBuf::from("bin/seven"),
            should_create_shortcut: false,
            resources,
        }
    }

    #[test]
    fn test_legacy_version_round_trips_as_string() {
        let json = serde_json::to_string(&InternalVersion::Legacy).unwrap();
        assert_eq!(json, "\"legacy\"");
        let parsed: InternalVersion = serde_json::from_str("\"legacy\"").unwrap();
        assert_eq!(parsed, InternalVersion::Legacy);
    }

    #[test]
    fn test_numeric_version_accepts_number_or_string() {
        let a: InternalVersion = serde_json::from_str("12").unwrap();
        let b: InternalVersion = serde_json::from_str("\"12\"").unwrap();
        assert_eq!(a, InternalVersion::Number(12));
        assert_eq!(a, b);
        assert!(serde_json::from_str::<InternalVersion>("\"nightly\"").is_err());
    }

    #[test]
    fn test_file_name_strips_query() {
        assert_eq!(resource(5, false).file_name(), "5.zip");
        let mut bare = resource(3, false);
        bare.patch_url = "https://cdn.example.com/".into();
        assert_eq!(bare.file_name(), "3.zip");
    }

    #[test]
    fn test_remote_resource_converts_mebibytes() {
        let info = RemoteUpdateInfo::from_json(
            br#"{"resources":[{"internalVersion":4,
                "patch":{"mimeType":"application/zip","url":"https://x/4.zip"},
                "patchMetadata":{"mimeType":"application/json","url":"https://x/4.json"},
                "patchSize":1.5,"isFullPackage":true}]}"#,
        )
        .unwrap();
        let resources = info.into_resources();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].patch_size_bytes, 1_572_864);
        assert!(resources[0].is_full_package);
        assert_eq!(resources[0].patch_url, "https://x/4.zip");
    }

    #[test]
    fn test_validate_rejects_empty_and_misplaced_full_package() {
        assert!(request(vec![]).validate().is_err());
        assert!(
            request(vec![resource(1, false), resource(2, true)])
                .validate()
                .is_err()
        );
        assert!(
            request(vec![resource(1, true), resource(2, false)])
                .validate()
                .is_ok()
        );
    }
}
