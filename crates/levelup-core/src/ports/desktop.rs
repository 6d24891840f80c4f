//! Desktop integration ports: launch shortcuts and protocol handlers.
//!
//! Both are best-effort from the pipeline's point of view; a failure is
//! logged and the install continues.

use std::path::Path;

use thiserror::Error;

/// Errors raised by desktop integration adapters.
#[derive(Debug, Error)]
pub enum DesktopIntegrationError {
    #[error("Shortcut creation failed: {0}")]
    Shortcut(String),

    #[error("Protocol registration failed: {0}")]
    Protocol(String),

    #[error("Not supported on this platform")]
    Unsupported,
}

/// Creates a desktop shortcut that launches a game through the launcher.
pub trait ShortcutPort: Send + Sync {
    fn create_shortcut(
        &self,
        title: &str,
        game_id: &str,
        runnable_path: &Path,
    ) -> Result<(), DesktopIntegrationError>;
}

/// Registers a URL protocol that launches a game executable.
pub trait ProtocolRegistrarPort: Send + Sync {
    fn register(&self, protocol: &str, runnable_path: &Path)
    -> Result<(), DesktopIntegrationError>;
}

/// Integration that records nothing, for headless runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDesktopIntegration;

impl ShortcutPort for NoopDesktopIntegration {
    fn create_shortcut(
        &self,
        title: &str,
        game_id: &str,
        _runnable_path: &Path,
    ) -> Result<(), DesktopIntegrationError> {
        tracing::debug!(target: "levelup.install", %title, %game_id, "shortcut creation skipped");
        Ok(())
    }
}

impl ProtocolRegistrarPort for NoopDesktopIntegration {
    fn register(
        &self,
        protocol: &str,
        _runnable_path: &Path,
    ) -> Result<(), DesktopIntegrationError> {
        tracing::debug!(target: "levelup.install", %protocol, "protocol registration skipped");
        Ok(())
    }
}
