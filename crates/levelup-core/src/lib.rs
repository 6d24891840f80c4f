//! Core domain types, events and ports of the levelup update pipeline.
//!
//! This crate turns nothing into anything on its own: it defines what a game
//! update looks like (resources, per-resource download and install state,
//! diff manifests), what the UI is told ([`UpdateEvent`]), what the host
//! download engine reports ([`HostEvent`]), and the ports adapters implement.
//!
//! - `domain` - pure data model
//! - `events` - UI-facing snapshots
//! - `host` - download engine lifecycle events
//! - `paths` - install directory layout
//! - `ports` - trait abstractions for infrastructure
//! - `settings` - pipeline configuration

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod errors;
pub mod events;
pub mod host;
pub mod paths;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    DiffManifest, DownloadState, DownloadStatus, GameId, InstallState, InstallStatus,
    InternalVersion, InterruptReason, LocalGameInfo, RemainingTime, RemoteAsset, RemoteResource,
    RemoteUpdateInfo, Resource, ResourceEntry, UnzipInterruptReason, UnzipProgress, UpdateEntry,
    UpdateRequest,
};
pub use errors::UpdateError;
pub use events::{ResourceSnapshot, UpdateEvent, UpdateProgressSnapshot};
pub use host::{DoneState, DownloadHandle, HostEvent, TransferProgress, TransferState};
pub use paths::{InstallLayout, PATCH_CONTENT_DIR, PATCH_METADATA_FILE, PATCH_WORKSPACE_DIR};
pub use ports::{
    ChannelUpdateEmitter, DesktopIntegrationError, DownloadEnginePort, FixedStorageProbe,
    GameInfoRepository, InMemoryGameInfoRepository, NoopDesktopIntegration, NoopUpdateEmitter,
    ProtocolRegistrarPort, RepositoryError, ShortcutPort, StorageProbePort, StorageSample,
    UpdateEventEmitterPort,
};
pub use settings::PipelineSettings;

