//! CLI-specific error types and mappings.
//!
//! Maps pipeline errors to exit codes and user-facing messages.

use levelup_core::{RepositoryError, UpdateError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Pipeline error.
    #[error("{0}")]
    Update(String),

    /// Argument or update description error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Network error while fetching the update description.
    #[error("Network error: {0}")]
    Network(String),

    /// Game record store error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The update stopped on a failure the retries did not clear.
    #[error("Update failed: {0}")]
    Failed(String),

    /// The user interrupted the run.
    #[error("Cancelled")]
    Cancelled,
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow sysexits.h where one fits.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Update(_) | Self::Failed(_) => 1,
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Network(_) => 69,  // EX_UNAVAILABLE
            Self::Storage(_) => 73,  // EX_CANTCREAT
            Self::Io(_) => 74,       // EX_IOERR
            Self::Cancelled => 130,
        }
    }
}

impl From<UpdateError> for CliError {
    fn from(err: UpdateError) -> Self {
        match err {
            UpdateError::InvalidRequest { message } | UpdateError::Manifest { message } => {
                Self::Arguments(message)
            }
            UpdateError::Io { .. } => Self::Io(err.to_string()),
            UpdateError::Persistence { message } => Self::Storage(message),
            other => Self::Update(other.user_message()),
        }
    }
}

impl From<RepositoryError> for CliError {
    fn from(err: RepositoryError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<reqwest::Error> for CliError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
