//! Install step errors.

use std::io;
use std::path::PathBuf;

use levelup_core::{UnzipInterruptReason, UpdateError};
use thiserror::Error;

/// Raw OS error for "no space left on device" on unix.
#[cfg(unix)]
const ENOSPC: i32 = 28;
/// `ERROR_DISK_FULL` and `ERROR_HANDLE_DISK_FULL` on Windows.
#[cfg(windows)]
const DISK_FULL_CODES: [i32; 2] = [112, 39];

/// Error raised by a filesystem step of an install.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Archive entry escapes destination: {0}")]
    UnsafeEntry(String),

    #[error("Manifest error: {0}")]
    Manifest(#[from] UpdateError),

    #[error("Extraction stopped: update no longer active")]
    Aborted,
}

impl InstallError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure was the volume running out of space.
    #[must_use]
    pub fn is_out_of_space(&self) -> bool {
        match self {
            Self::Io { source, .. } => is_out_of_space(source),
            Self::Archive(zip::result::ZipError::Io(source)) => is_out_of_space(source),
            _ => false,
        }
    }

    /// Reason recorded in the unzip progress of a failed extraction.
    #[must_use]
    pub fn unzip_interrupt_reason(&self) -> UnzipInterruptReason {
        if self.is_out_of_space() {
            UnzipInterruptReason::NotEnoughSpaceForUnzip
        } else {
            UnzipInterruptReason::Unknown
        }
    }
}

impl From<InstallError> for UpdateError {
    fn from(err: InstallError) -> Self {
        match err {
            InstallError::Manifest(inner) => inner,
            other => {
                let out_of_space = other.is_out_of_space();
                Self::extraction(other.to_string(), out_of_space)
            }
        }
    }
}

fn is_out_of_space(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::StorageFull {
        return true;
    }
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(ENOSPC)
    }
    #[cfg(windows)]
    {
        err.raw_os_error()
            .is_some_and(|code| DISK_FULL_CODES.contains(&code))
    }
    #[cfg(not(any(unix, windows)))]
    {
        false
    }
}
