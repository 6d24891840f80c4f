//! Domain types for the update pipeline.
//!
//! These are pure data structures with no infrastructure dependencies.

mod entry;
mod game_info;
mod manifest;
mod resource;
mod state;

pub use entry::{ResourceEntry, UpdateEntry};
pub use game_info::LocalGameInfo;
pub use manifest::DiffManifest;
pub use resource::{
    GameId, InternalVersion, RemoteAsset, RemoteResource, RemoteUpdateInfo, Resource,
    UpdateRequest,
};
pub use state::{
    DownloadState, DownloadStatus, InstallState, InstallStatus, InterruptReason, RemainingTime,
    UnzipInterruptReason, UnzipProgress,
};
