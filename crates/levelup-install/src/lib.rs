//! Filesystem side of levelup installs.
//!
//! Blocking primitives only; the update manager runs them on the blocking
//! thread pool and turns their results into install state.
//!
//! - `archive` - zip extraction with progress
//! - `patch` - diff manifest application
//! - `fs` - hashing, moving and removal helpers
//! - `storage` - free-space probe

pub mod archive;
pub mod error;
pub mod fs;
pub mod patch;
mod storage;

pub use archive::{ExtractionSummary, extract_archive};
pub use error::InstallError;
pub use fs::{move_file, remove_path, remove_staged, sha256_file};
pub use patch::{
    AdditionReport, FileFailure, HashMismatch, RemovalReport, add_files, read_manifest, remove_files,
};
pub use storage::SystemStorageProbe;
