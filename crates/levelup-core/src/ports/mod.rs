//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the update pipeline expects from
//! infrastructure. They contain no implementation details and use only
//! domain types.
//!
//! # Design Rules
//!
//! - Engine commands are fire-and-forget; results come back as `HostEvent`s
//! - Repositories are async and CRUD-focused
//! - Desktop integration and storage probing are synchronous and cheap

pub mod desktop;
pub mod download_engine;
pub mod event_emitter;
pub mod game_info;
pub mod storage_probe;

use thiserror::Error;

pub use desktop::{
    DesktopIntegrationError, NoopDesktopIntegration, ProtocolRegistrarPort, ShortcutPort,
};
pub use download_engine::DownloadEnginePort;
pub use event_emitter::{ChannelUpdateEmitter, NoopUpdateEmitter, UpdateEventEmitterPort};
pub use game_info::{GameInfoRepository, InMemoryGameInfoRepository};
pub use storage_probe::{FixedStorageProbe, StorageProbePort, StorageSample};

#[cfg(any(test, feature = "test-utils"))]
pub use download_engine::MockDownloadEnginePort;
#[cfg(any(test, feature = "test-utils"))]
pub use storage_probe::MockStorageProbePort;

/// Domain-specific errors for repository operations.
///
/// This error type abstracts away storage implementation details and
/// provides a clean interface for services to handle storage failures.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The requested entity was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage backend error (database, filesystem, etc.).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<RepositoryError> for crate::errors::UpdateError {
    fn from(err: RepositoryError) -> Self {
        Self::persistence(err.to_string())
    }
}
