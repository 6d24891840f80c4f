//! Pipeline settings.
//!
//! Plain configuration values with defaults and builder methods. Adapters
//! (the CLI, a desktop shell) decide where the values come from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default free-space floor below which an interruption is blamed on disk space.
pub const DEFAULT_FREE_SPACE_THRESHOLD_BYTES: u64 = 20 * 1024 * 1024;

/// Default prefix of the per-game launch protocol.
pub const DEFAULT_DEEPLINK_PREFIX: &str = "levelup-game-launch-";

/// Default archive extension accepted by the install pipeline.
pub const DEFAULT_ARCHIVE_EXTENSION: &str = ".zip";

/// Host engine error code raised for aborted (user-cancelled) requests.
pub const ABORTED_ERROR_CODE: &str = "net::ERR_ABORTED";

/// Settings of the update pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineSettings {
    /// Free space under which an interruption is classified as a disk shortfall.
    pub free_space_threshold_bytes: u64,
    /// Treat a patched file whose hash does not match the manifest as a failure.
    pub strict_hash_verification: bool,
    /// Headers forwarded with every download command.
    pub request_headers: BTreeMap<String, String>,
    /// Protocol name prefix; the game id is appended.
    pub deeplink_prefix: String,
    /// Extension a completed download must carry to be installed.
    pub archive_extension: String,
    /// Host error codes that are not failures.
    pub ignored_error_codes: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            free_space_threshold_bytes: DEFAULT_FREE_SPACE_THRESHOLD_BYTES,
            strict_hash_verification: false,
            request_headers: BTreeMap::new(),
            deeplink_prefix: DEFAULT_DEEPLINK_PREFIX.to_string(),
            archive_extension: DEFAULT_ARCHIVE_EXTENSION.to_string(),
            ignored_error_codes: vec![ABORTED_ERROR_CODE.to_string()],
        }
    }
}

impl PipelineSettings {
    #[must_use]
    pub const fn with_free_space_threshold(mut self, bytes: u64) -> Self {
        self.free_space_threshold_bytes = bytes;
        self
    }

    #[must_use]
    pub const fn with_strict_hash_verification(mut self, strict: bool) -> Self {
        self.strict_hash_verification = strict;
        self
    }

    /// Add a header forwarded with every download command.
    #[must_use]
    pub fn with_request_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_deeplink_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.deeplink_prefix = prefix.into();
        self
    }

    /// Protocol registered for a game.
    #[must_use]
    pub fn protocol_for(&self, game_id: &str) -> String {
        format!("{}{game_id}", self.deeplink_prefix)
    }

    /// Whether a saved file carries the accepted archive extension.
    #[must_use]
    pub fn is_archive(&self, path_or_url: &str) -> bool {
        let without_query = path_or_url.split(['?', '#']).next().unwrap_or_default();
        without_query
            .to_ascii_lowercase()
            .ends_with(&self.archive_extension.to_ascii_lowercase())
    }

    #[must_use]
    pub fn is_ignored_error(&self, code: &str) -> bool {
        self.ignored_error_codes.iter().any(|c| c == code)
    }
}
