//! Shared harness for update pipeline integration tests.
//!
//! The host download engine is replaced by [`RecordingEngine`]; tests play
//! the host's part by feeding [`HostEvent`]s and writing archive bytes to the
//! save path the pipeline chose.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use levelup_core::{
    ChannelUpdateEmitter, DesktopIntegrationError, DoneState, DownloadEnginePort, DownloadHandle,
    FixedStorageProbe, GameId, HostEvent, InMemoryGameInfoRepository, InstallStatus,
    InternalVersion, PATCH_CONTENT_DIR, PATCH_METADATA_FILE, PipelineSettings,
    ProtocolRegistrarPort, Resource, ShortcutPort, TransferProgress, UpdateEvent,
    UpdateProgressSnapshot, UpdateRequest,
};
use levelup_update::{StartOutcome, UpdateManager, UpdateManagerDeps, build_update_manager};
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;
use zip::write::SimpleFileOptions;

pub const GAME: &str = "moonfall";
pub const RUNNABLE: &str = "bin/moonfall.exe";

/// SHA-256 of `abc`.
pub const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

pub fn game_id() -> GameId {
    GameId::new(GAME)
}

pub fn url(version: u64) -> String {
    format!("https://cdn.example.com/{GAME}/{version}.zip?token=t0k3n")
}

pub fn full_package(version: u64) -> Resource {
    Resource {
        internal_version: InternalVersion::Number(version),
        is_full_package: true,
        patch_url: url(version),
        patch_metadata_url: format!("https://cdn.example.com/{GAME}/{version}.json"),
        patch_size_bytes: 4096,
    }
}

pub fn patch(version: u64) -> Resource {
    Resource {
        is_full_package: false,
        ..full_package(version)
    }
}

/// In-memory zip with the given `(name, content)` files.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Full build: the executable plus two data files.
pub fn game_archive() -> Vec<u8> {
    zip_bytes(&[
        (RUNNABLE, b"moonfall v1"),
        ("data/old.txt", b"obsolete"),
        ("data/keep.txt", b"kept"),
    ])
}

/// Incremental archive adding `data/new.txt` (content `abc`) and removing
/// `removed`.
pub fn patch_archive(removed: &[&str], new_hash: &str) -> Vec<u8> {
    let manifest = serde_json::json!({
        "added": { "data/new.txt": new_hash },
        "removed": removed,
    })
    .to_string();
    let content_path = format!("{PATCH_CONTENT_DIR}/data/new.txt");
    zip_bytes(&[
        (PATCH_METADATA_FILE, manifest.as_bytes()),
        (content_path.as_str(), b"abc"),
    ])
}

/// SHA-256 of `bytes`, computed the way the pipeline verifies files.
pub fn sha256_of(bytes: &[u8]) -> String {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("blob");
    std::fs::write(&path, bytes).unwrap();
    levelup_install::sha256_file(&path).unwrap()
}

/// Incremental archive carrying `payload` files and a manifest listing
/// `added` (path and hash) and `removed`.
pub fn diff_archive(
    payload: &[(&str, &[u8])],
    added: &[(&str, String)],
    removed: &[&str],
) -> Vec<u8> {
    let added: BTreeMap<&str, &str> = added.iter().map(|(p, h)| (*p, h.as_str())).collect();
    let manifest = serde_json::json!({ "added": added, "removed": removed }).to_string();
    let content: Vec<(String, &[u8])> = payload
        .iter()
        .map(|(p, bytes)| (format!("{PATCH_CONTENT_DIR}/{p}"), *bytes))
        .collect();
    let mut entries: Vec<(&str, &[u8])> = vec![(PATCH_METADATA_FILE, manifest.as_bytes())];
    entries.extend(content.iter().map(|(p, bytes)| (p.as_str(), *bytes)));
    zip_bytes(&entries)
}

/// A command the pipeline issued to the host engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Start(String),
    SavePath(DownloadHandle, PathBuf),
    Reject(DownloadHandle),
    Pause(DownloadHandle),
    Resume(DownloadHandle),
    Cancel(DownloadHandle),
}

/// Engine that records commands and transfers nothing.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<EngineCall>>,
    resumable: AtomicBool,
}

impl RecordingEngine {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Start(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn save_path(&self, handle: DownloadHandle) -> Option<PathBuf> {
        self.calls().into_iter().rev().find_map(|call| match call {
            EngineCall::SavePath(h, path) if h == handle => Some(path),
            _ => None,
        })
    }

    pub fn set_resumable(&self, resumable: bool) {
        self.resumable.store(resumable, Ordering::SeqCst);
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl DownloadEnginePort for RecordingEngine {
    fn start_download(&self, url: &str, _headers: &BTreeMap<String, String>) {
        self.record(EngineCall::Start(url.to_string()));
    }

    fn set_save_path(&self, handle: DownloadHandle, path: &Path) {
        self.record(EngineCall::SavePath(handle, path.to_path_buf()));
    }

    fn reject(&self, handle: DownloadHandle) {
        self.record(EngineCall::Reject(handle));
    }

    fn pause(&self, handle: DownloadHandle) {
        self.record(EngineCall::Pause(handle));
    }

    fn resume(&self, handle: DownloadHandle) {
        self.record(EngineCall::Resume(handle));
    }

    fn cancel(&self, handle: DownloadHandle) {
        self.record(EngineCall::Cancel(handle));
    }

    fn can_resume(&self, _handle: DownloadHandle) -> bool {
        self.resumable.load(Ordering::SeqCst)
    }
}

/// Desktop integration that records what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingDesktop {
    pub shortcuts: Mutex<Vec<String>>,
    pub protocols: Mutex<Vec<(String, PathBuf)>>,
}

impl ShortcutPort for RecordingDesktop {
    fn create_shortcut(
        &self,
        title: &str,
        _game_id: &str,
        _runnable_path: &Path,
    ) -> Result<(), DesktopIntegrationError> {
        self.shortcuts.lock().unwrap().push(title.to_string());
        Ok(())
    }
}

impl ProtocolRegistrarPort for RecordingDesktop {
    fn register(
        &self,
        protocol: &str,
        runnable_path: &Path,
    ) -> Result<(), DesktopIntegrationError> {
        self.protocols
            .lock()
            .unwrap()
            .push((protocol.to_string(), runnable_path.to_path_buf()));
        Ok(())
    }
}

pub struct Harness {
    pub manager: Arc<UpdateManager>,
    pub engine: Arc<RecordingEngine>,
    pub desktop: Arc<RecordingDesktop>,
    pub game_info: Arc<InMemoryGameInfoRepository>,
    pub events: mpsc::UnboundedReceiver<UpdateEvent>,
    pub root: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(PipelineSettings::default(), FixedStorageProbe(None))
    }

    pub fn with(settings: PipelineSettings, storage: FixedStorageProbe) -> Self {
        let engine = Arc::new(RecordingEngine::default());
        let desktop = Arc::new(RecordingDesktop::default());
        let game_info = Arc::new(InMemoryGameInfoRepository::new());
        let (emitter, events) = ChannelUpdateEmitter::channel();
        let manager = build_update_manager(UpdateManagerDeps {
            engine: engine.clone(),
            event_emitter: Arc::new(emitter),
            game_info: game_info.clone(),
            shortcuts: desktop.clone(),
            protocols: desktop.clone(),
            storage: Arc::new(storage),
            settings,
        });
        Self {
            manager,
            engine,
            desktop,
            game_info,
            events,
            root: TempDir::new().unwrap(),
        }
    }

    pub fn target(&self) -> PathBuf {
        self.root.path().join("moonfall")
    }

    pub fn request(&self, resources: Vec<Resource>) -> UpdateRequest {
        UpdateRequest {
            game_id: game_id(),
            title: "Moonfall".into(),
            target_directory: self.target(),
            runnable_path: PathBuf::from(RUNNABLE),
            should_create_shortcut: true,
            resources,
        }
    }

    pub async fn start(&self, resources: Vec<Resource>) -> Uuid {
        match self.manager.start(self.request(resources)).await.unwrap() {
            StartOutcome::Started { operation_id } => operation_id,
            StartOutcome::AlreadyInProgress => panic!("update unexpectedly in progress"),
        }
    }

    /// Attach `handle` to `url` and return the save path the pipeline chose.
    pub async fn attach(&self, handle: u64, url: &str) -> PathBuf {
        let handle = DownloadHandle::new(handle);
        self.manager
            .handle_host_event(HostEvent::attached(handle, url))
            .await;
        self.engine.save_path(handle).expect("save path assigned")
    }

    /// Write `bytes` to the handle's save path and report completion.
    pub async fn complete(&self, handle: u64, bytes: &[u8]) {
        let handle = DownloadHandle::new(handle);
        let path = self.engine.save_path(handle).expect("attached");
        std::fs::write(&path, bytes).unwrap();
        let size = bytes.len() as u64;
        self.manager
            .handle_host_event(HostEvent::progressing(
                handle,
                TransferProgress::new(size / 2, size, 1024),
            ))
            .await;
        self.manager
            .handle_host_event(HostEvent::done(
                handle,
                DoneState::Completed,
                TransferProgress::new(size, size, 1024),
            ))
            .await;
    }

    pub async fn deliver(&self, handle: u64, url: &str, bytes: &[u8]) {
        self.attach(handle, url).await;
        self.complete(handle, bytes).await;
    }

    pub fn snapshot(&self) -> Option<UpdateProgressSnapshot> {
        self.manager.snapshot(&game_id())
    }

    /// Poll the game's snapshot until `pred` holds.
    pub async fn wait_for(
        &self,
        pred: impl Fn(&UpdateProgressSnapshot) -> bool,
    ) -> UpdateProgressSnapshot {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if let Some(snapshot) = self.snapshot().filter(|s| pred(s)) {
                    return snapshot;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time")
    }

    pub async fn wait_for_status(
        &self,
        index: usize,
        status: InstallStatus,
    ) -> UpdateProgressSnapshot {
        self.wait_for(|s| s.resources[index].install.status == status)
            .await
    }

    /// Install statuses of resource `index` seen in emitted snapshots, with
    /// consecutive repeats collapsed.
    pub fn drain_install_statuses(&mut self, index: usize) -> Vec<InstallStatus> {
        let mut statuses: Vec<InstallStatus> = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let UpdateEvent::Progress { snapshot } = event {
                let status = snapshot.resources[index].install.status;
                if statuses.last() != Some(&status) {
                    statuses.push(status);
                }
            }
        }
        statuses
    }
}

/// Poll `cond` until it holds.
pub async fn eventually(cond: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
