//! Update pipeline error types.
//!
//! These errors are serializable and do not depend on external error types
//! like `std::io::Error`. For I/O errors, we capture the kind and message as
//! strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{GameId, InternalVersion};

/// Error type for update operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum UpdateError {
    /// No live update entry for the game.
    #[error("No update in progress for game {game_id}")]
    NotFound {
        /// Game that was looked up.
        game_id: GameId,
    },

    /// The entry exists but does not track the requested resource.
    #[error("Game {game_id} has no resource for version {version}")]
    ResourceNotFound {
        game_id: GameId,
        version: InternalVersion,
    },

    /// The update request violates the chain ordering rules.
    #[error("Invalid update request: {message}")]
    InvalidRequest { message: String },

    /// I/O error during file operations.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error (e.g., "not found", "permission denied").
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// Diff manifest or update description could not be parsed.
    #[error("Manifest error: {message}")]
    Manifest { message: String },

    /// Archive extraction failed.
    #[error("Extraction failed: {message}")]
    Extraction {
        message: String,
        /// Whether the target volume ran out of space.
        out_of_space: bool,
    },

    /// Local game record could not be read or written.
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// Desktop integration (shortcut or protocol handler) failed.
    #[error("Desktop integration failed: {message}")]
    Integration { message: String },

    /// General/uncategorized error.
    #[error("{message}")]
    Other { message: String },
}

impl UpdateError {
    #[must_use]
    pub const fn not_found(game_id: GameId) -> Self {
        Self::NotFound { game_id }
    }

    #[must_use]
    pub const fn resource_not_found(game_id: GameId, version: InternalVersion) -> Self {
        Self::ResourceNotFound { game_id, version }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create an I/O error from a `std::io::Error`.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        let kind = err.kind();
        Self::Io {
            kind: format!("{kind:?}"),
            message: err.to_string(),
        }
    }

    pub fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest {
            message: message.into(),
        }
    }

    pub fn extraction(message: impl Into<String>, out_of_space: bool) -> Self {
        Self::Extraction {
            message: message.into(),
            out_of_space,
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    pub fn integration(message: impl Into<String>) -> Self {
        Self::Integration {
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Check if a user-triggered retry can plausibly succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Extraction { .. } | Self::Persistence { .. }
        )
    }

    /// Get a user-friendly error message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { .. } => "This game has no update in progress.".to_string(),
            Self::ResourceNotFound { version, .. } => {
                format!("Version {version} is not part of this update.")
            }
            Self::Extraction {
                out_of_space: true, ..
            } => "Not enough disk space to unpack the update.".to_string(),
            Self::Extraction { .. } => "The downloaded update could not be unpacked.".to_string(),
            Self::Manifest { .. } => "The update files are damaged.".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<std::io::Error> for UpdateError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io_error(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: UpdateError = io.into();
        assert!(matches!(err, UpdateError::Io { ref kind, .. } if kind == "NotFound"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_user_message_for_out_of_space() {
        let err = UpdateError::extraction("ENOSPC", true);
        assert_eq!(
            err.user_message(),
            "Not enough disk space to unpack the update."
        );
        assert!(!UpdateError::not_found(GameId::new("x")).is_recoverable());
    }

    #[test]
    fn test_error_serializes() {
        let err = UpdateError::resource_not_found(GameId::new("g"), InternalVersion::Number(3));
        let json = serde_json::to_string(&err).unwrap();
        let back: UpdateError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
