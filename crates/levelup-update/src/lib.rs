//! Update pipeline for levelup.
//!
//! Sequences the download and install of a game's resources, reduces host
//! download events into per-game state, and pushes a snapshot to the UI on
//! every change.
//!
//! - `registry` - in-memory store of live updates, one per game
//! - `reporter` - registry writes that emit progress snapshots
//! - `retry` - interruption classification and retry planning
//! - `manager` - commands, host event reduction and the install chain

// Re-export core types for convenience
pub use levelup_core::{
    DoneState, DownloadHandle, HostEvent, PipelineSettings, TransferProgress, TransferState,
    UpdateError, UpdateEvent, UpdateProgressSnapshot, UpdateRequest,
};

mod registry;
mod reporter;
mod retry;

pub use registry::UpdateRegistry;
pub use reporter::ProgressReporter;
pub use retry::{
    DownloadRetry, RetryOutcome, classify_failure, classify_interruption,
    find_first_erroring_download, find_first_erroring_install, plan_download_retry,
};

// Public API
mod manager;

pub use manager::{StartOutcome, UpdateManager, UpdateManagerDeps, build_update_manager};
