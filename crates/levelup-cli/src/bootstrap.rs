//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the CLI adapter:
//! - HTTP download engine (reqwest) feeding host events to the manager
//! - JSON game info store under the launcher data directory
//! - System storage probe (via levelup-install)
//! - Update manager (via levelup-update) with a channel event emitter
//!
//! Command handlers receive the composed [`CliContext`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use levelup_core::{
    ChannelUpdateEmitter, NoopDesktopIntegration, PipelineSettings, UpdateEvent,
};
use levelup_install::SystemStorageProbe;
use levelup_update::{UpdateManager, UpdateManagerDeps, build_update_manager};
use tokio::runtime::Handle;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::adapters::{HttpDownloadEngine, JsonGameInfoRepository};

/// File name of the installed game store inside the data directory.
pub const GAMES_FILE: &str = "games.json";

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Directory for launcher state.
    pub data_dir: PathBuf,
    /// Pipeline settings for this invocation.
    pub settings: PipelineSettings,
}

impl CliConfig {
    /// Resolve the data directory: explicit override, else the platform
    /// data directory.
    pub fn resolve(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => dirs::data_dir()
                .context("no platform data directory; pass --data-dir")?
                .join("levelup"),
        };
        Ok(Self {
            data_dir,
            settings: PipelineSettings::default(),
        })
    }

    #[must_use]
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn games_file(&self) -> PathBuf {
        self.data_dir.join(GAMES_FILE)
    }
}

/// Fully composed context for CLI commands.
pub struct CliContext {
    /// The update pipeline.
    pub manager: Arc<UpdateManager>,
    /// UI events emitted by the pipeline.
    pub events: Mutex<mpsc::UnboundedReceiver<UpdateEvent>>,
    /// Installed game records.
    pub game_info: Arc<JsonGameInfoRepository>,
    /// Client shared by the download engine and manifest fetches.
    pub http: reqwest::Client,
    host_loop: JoinHandle<()>,
}

impl CliContext {
    /// Access the update manager.
    pub const fn manager(&self) -> &Arc<UpdateManager> {
        &self.manager
    }

    pub fn games_path(&self) -> &Path {
        self.game_info.path()
    }
}

impl Drop for CliContext {
    fn drop(&mut self) {
        self.host_loop.abort();
    }
}

/// Build the HTTP client used for every request.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("levelup/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

/// Bootstrap the CLI application.
///
/// Must run inside a tokio runtime: the host event loop and transfer tasks
/// are spawned onto it.
pub fn bootstrap(config: &CliConfig) -> Result<CliContext> {
    let http = http_client()?;
    let (host_tx, host_rx) = mpsc::unbounded_channel();
    let engine = HttpDownloadEngine::new(http.clone(), host_tx, Handle::current());

    let (emitter, events) = ChannelUpdateEmitter::channel();
    let game_info = Arc::new(JsonGameInfoRepository::new(config.games_file()));

    let manager = build_update_manager(UpdateManagerDeps {
        engine: Arc::new(engine),
        event_emitter: Arc::new(emitter),
        game_info: game_info.clone(),
        shortcuts: Arc::new(NoopDesktopIntegration),
        protocols: Arc::new(NoopDesktopIntegration),
        storage: Arc::new(SystemStorageProbe::new()),
        settings: config.settings.clone(),
    });
    let host_loop = tokio::spawn(Arc::clone(&manager).run(host_rx));

    tracing::debug!(
        data_dir = %config.data_dir.display(),
        "levelup context ready"
    );
    Ok(CliContext {
        manager,
        events: Mutex::new(events),
        game_info,
        http,
        host_loop,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_data_dir_wins() {
        let config = CliConfig::resolve(Some(PathBuf::from("/srv/levelup"))).unwrap();
        assert_eq!(config.games_file(), PathBuf::from("/srv/levelup/games.json"));
        assert_eq!(config.settings, PipelineSettings::default());
    }

    #[tokio::test]
    async fn test_bootstrap_composes_idle_context() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::resolve(Some(dir.path().to_path_buf()))
            .unwrap()
            .with_settings(PipelineSettings::default().with_strict_hash_verification(true));
        let ctx = bootstrap(&config).unwrap();

        assert!(ctx.manager().settings().strict_hash_verification);
        assert!(ctx.manager().snapshots().is_empty());
        assert_eq!(ctx.games_path(), dir.path().join(GAMES_FILE));
    }
}
