//! HTTP download engine.
//!
//! Implements [`DownloadEnginePort`] on top of `reqwest` streaming. Every
//! handle runs at most one transfer task at a time: pausing cancels the task,
//! resuming starts a new one with a `Range` request from the bytes already on
//! disk. Everything the task observes is reported as a [`HostEvent`].

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::StreamExt;
use levelup_core::{DoneState, DownloadEnginePort, DownloadHandle, HostEvent, TransferProgress};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_RANGES, RANGE};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::throttle::ProgressThrottle;

/// Bookkeeping for one engine handle.
#[derive(Debug)]
struct Transfer {
    url: String,
    headers: BTreeMap<String, String>,
    save_path: Option<PathBuf>,
    token: CancellationToken,
    running: bool,
    paused: bool,
    cancelled: bool,
    resume_requested: bool,
    accepts_ranges: bool,
    received_bytes: u64,
    total_bytes: u64,
}

impl Transfer {
    fn new(url: &str, headers: &BTreeMap<String, String>) -> Self {
        Self {
            url: url.to_string(),
            headers: headers.clone(),
            save_path: None,
            token: CancellationToken::new(),
            running: false,
            paused: false,
            cancelled: false,
            resume_requested: false,
            accepts_ranges: false,
            received_bytes: 0,
            total_bytes: 0,
        }
    }

    const fn can_resume(&self) -> bool {
        self.accepts_ranges && self.save_path.is_some() && !self.cancelled
    }

    fn progress(&self, bytes_per_second: u64) -> TransferProgress {
        TransferProgress::new(self.received_bytes, self.total_bytes, bytes_per_second)
            .paused(self.paused)
            .resumable(self.can_resume())
    }
}

/// What a transfer task was asked to do.
struct Job {
    handle: DownloadHandle,
    url: String,
    headers: BTreeMap<String, String>,
    save_path: PathBuf,
    resume: bool,
    token: CancellationToken,
}

enum Finish {
    Completed,
    /// Stopped by a pause or cancel command.
    Stopped,
}

#[derive(Debug, Error)]
enum TransferError {
    /// The request never produced a usable response.
    #[error("request failed: {0}")]
    Request(String),

    #[error("stream interrupted: {0}")]
    Stream(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

struct Shared {
    client: reqwest::Client,
    events: mpsc::UnboundedSender<HostEvent>,
    runtime: Handle,
    transfers: Mutex<HashMap<DownloadHandle, Transfer>>,
}

impl Shared {
    fn transfers(&self) -> MutexGuard<'_, HashMap<DownloadHandle, Transfer>> {
        self.transfers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: HostEvent) {
        if self.events.send(event).is_err() {
            trace!(target: "levelup.download", "host event receiver dropped");
        }
    }

    /// Record new counters and report them, unless the handle is gone.
    fn progressed(&self, handle: DownloadHandle, received_bytes: u64, bytes_per_second: u64) {
        let event = {
            let mut transfers = self.transfers();
            let Some(transfer) = transfers.get_mut(&handle) else {
                return;
            };
            transfer.received_bytes = received_bytes;
            transfer.total_bytes = transfer.total_bytes.max(received_bytes);
            HostEvent::progressing(handle, transfer.progress(bytes_per_second))
        };
        self.emit(event);
    }
}

/// [`DownloadEnginePort`] backed by `reqwest`.
pub struct HttpDownloadEngine {
    shared: Arc<Shared>,
    next_handle: AtomicU64,
}

impl HttpDownloadEngine {
    /// Create an engine reporting into `events`; transfer tasks run on `runtime`.
    pub fn new(
        client: reqwest::Client,
        events: mpsc::UnboundedSender<HostEvent>,
        runtime: Handle,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                events,
                runtime,
                transfers: Mutex::new(HashMap::new()),
            }),
            next_handle: AtomicU64::new(1),
        }
    }
}

/// Start a transfer task for `handle` if it has a save path and is idle.
fn launch(shared: &Arc<Shared>, handle: DownloadHandle, resume: bool) {
    let job = {
        let mut transfers = shared.transfers();
        let Some(transfer) = transfers.get_mut(&handle) else {
            debug!(target: "levelup.download", %handle, "launch of unknown handle ignored");
            return;
        };
        let Some(save_path) = transfer.save_path.clone() else {
            return;
        };
        if transfer.running {
            // A pause is still winding down; restart once it has.
            transfer.resume_requested = transfer.paused;
            return;
        }
        transfer.running = true;
        transfer.paused = false;
        transfer.resume_requested = false;
        transfer.token = CancellationToken::new();
        Job {
            handle,
            url: transfer.url.clone(),
            headers: transfer.headers.clone(),
            save_path,
            resume: resume && transfer.accepts_ranges,
            token: transfer.token.clone(),
        }
    };

    debug!(
        target: "levelup.download",
        handle = %job.handle,
        url = %job.url,
        path = %job.save_path.display(),
        resume = job.resume,
        "transfer started"
    );
    let task_shared = Arc::clone(shared);
    shared.runtime.spawn(async move {
        if run(&task_shared, job).await {
            launch(&task_shared, handle, true);
        }
    });
}

/// Drive one transfer task and report how it ended.
///
/// Returns `true` when a resume arrived while the task was pausing.
async fn run(shared: &Shared, job: Job) -> bool {
    let result = transfer(shared, &job).await;

    let handle = job.handle;
    let mut events = Vec::with_capacity(2);
    let relaunch = {
        let mut transfers = shared.transfers();
        let Some(state) = transfers.get_mut(&handle) else {
            // Rejected while running.
            return false;
        };
        state.running = false;

        let mut relaunch = false;
        let mut forget = true;
        match result {
            Ok(Finish::Completed) => {
                debug!(target: "levelup.download", %handle, bytes = state.received_bytes, "transfer completed");
                events.push(HostEvent::done(handle, DoneState::Completed, state.progress(0)));
            }
            Ok(Finish::Stopped) if state.cancelled => {
                events.push(HostEvent::done(handle, DoneState::Cancelled, state.progress(0)));
            }
            Ok(Finish::Stopped) => {
                forget = false;
                if state.resume_requested {
                    relaunch = true;
                } else {
                    events.push(HostEvent::interrupted(handle, state.progress(0)));
                }
            }
            Err(TransferError::Request(code)) => {
                warn!(target: "levelup.download", %handle, url = %job.url, %code, "request failed");
                events.push(HostEvent::request_failed(&job.url, code));
                events.push(HostEvent::done(handle, DoneState::Interrupted, state.progress(0)));
            }
            Err(err) => {
                warn!(target: "levelup.download", %handle, url = %job.url, error = %err, "transfer interrupted");
                forget = false;
                events.push(HostEvent::interrupted(handle, state.progress(0)));
            }
        }
        if forget {
            transfers.remove(&handle);
        }
        relaunch
    };

    for event in events {
        shared.emit(event);
    }
    relaunch
}

async fn transfer(shared: &Shared, job: &Job) -> Result<Finish, TransferError> {
    let offset = if job.resume {
        existing_len(&job.save_path).await
    } else {
        0
    };

    let mut request = shared.client.get(&job.url);
    for (name, value) in &job.headers {
        request = request.header(name.as_str(), value.as_str());
    }
    if offset > 0 {
        request = request.header(RANGE, format!("bytes={offset}-"));
    }

    let response = tokio::select! {
        () = job.token.cancelled() => return Ok(Finish::Stopped),
        response = request.send() => response.map_err(|err| TransferError::Request(error_code(&err)))?,
    };

    let status = response.status();
    if !status.is_success() {
        return Err(TransferError::Request(format!("HTTP_{}", status.as_u16())));
    }
    let partial = status == StatusCode::PARTIAL_CONTENT;
    // A server that ignores the range sends the whole body again.
    let offset = if partial { offset } else { 0 };
    let accepts_ranges = partial
        || response
            .headers()
            .get(ACCEPT_RANGES)
            .is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"bytes"));
    let total_bytes = response.content_length().map_or(0, |len| len + offset);
    {
        let mut transfers = shared.transfers();
        if let Some(state) = transfers.get_mut(&job.handle) {
            state.accepts_ranges = accepts_ranges;
            state.received_bytes = offset;
            state.total_bytes = total_bytes;
        }
    }

    let mut file = if offset > 0 {
        tokio::fs::OpenOptions::new()
            .append(true)
            .open(&job.save_path)
            .await?
    } else {
        tokio::fs::File::create(&job.save_path).await?
    };

    let mut received = offset;
    let mut throttle = ProgressThrottle::default_interval();
    let mut stream = response.bytes_stream();
    loop {
        let chunk = tokio::select! {
            () = job.token.cancelled() => {
                file.flush().await?;
                shared.progressed(job.handle, received, 0);
                return Ok(Finish::Stopped);
            }
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else {
            break;
        };
        let bytes = chunk.map_err(|err| TransferError::Stream(err.to_string()))?;
        file.write_all(&bytes).await?;

        let len = bytes.len() as u64;
        received += len;
        throttle.record(len);
        if let Some(rate) = throttle.should_emit() {
            shared.progressed(job.handle, received, rate);
        }
    }
    file.flush().await?;

    if let Some(state) = shared.transfers().get_mut(&job.handle) {
        state.received_bytes = received;
        state.total_bytes = received;
    }
    Ok(Finish::Completed)
}

async fn existing_len(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .map_or(0, |metadata| metadata.len())
}

/// Host-style error code of a failed request.
fn error_code(err: &reqwest::Error) -> String {
    let code = if err.is_timeout() {
        "net::ERR_TIMED_OUT"
    } else if err.is_connect() {
        "net::ERR_CONNECTION_FAILED"
    } else if err.is_redirect() {
        "net::ERR_TOO_MANY_REDIRECTS"
    } else {
        "net::ERR_FAILED"
    };
    code.to_string()
}

impl DownloadEnginePort for HttpDownloadEngine {
    fn start_download(&self, url: &str, headers: &BTreeMap<String, String>) {
        let handle = DownloadHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.shared
            .transfers()
            .insert(handle, Transfer::new(url, headers));
        debug!(target: "levelup.download", %handle, %url, "transfer attached");
        self.shared.emit(HostEvent::attached(handle, url));
    }

    fn set_save_path(&self, handle: DownloadHandle, path: &Path) {
        {
            let mut transfers = self.shared.transfers();
            let Some(transfer) = transfers.get_mut(&handle) else {
                warn!(target: "levelup.download", %handle, "save path for unknown handle");
                return;
            };
            transfer.save_path = Some(path.to_path_buf());
        }
        launch(&self.shared, handle, false);
    }

    fn reject(&self, handle: DownloadHandle) {
        if let Some(transfer) = self.shared.transfers().remove(&handle) {
            transfer.token.cancel();
            debug!(target: "levelup.download", %handle, url = %transfer.url, "transfer rejected");
        }
    }

    fn pause(&self, handle: DownloadHandle) {
        let mut transfers = self.shared.transfers();
        if let Some(transfer) = transfers.get_mut(&handle) {
            if transfer.running && !transfer.cancelled {
                transfer.paused = true;
                transfer.resume_requested = false;
                transfer.token.cancel();
            }
        }
    }

    fn resume(&self, handle: DownloadHandle) {
        launch(&self.shared, handle, true);
    }

    fn cancel(&self, handle: DownloadHandle) {
        let idle = {
            let mut transfers = self.shared.transfers();
            let Some(transfer) = transfers.get_mut(&handle) else {
                return;
            };
            transfer.cancelled = true;
            transfer.resume_requested = false;
            transfer.token.cancel();
            if transfer.running {
                None
            } else {
                transfers
                    .remove(&handle)
                    .map(|t| HostEvent::done(handle, DoneState::Cancelled, t.progress(0)))
            }
        };
        if let Some(event) = idle {
            self.shared.emit(event);
        }
    }

    fn can_resume(&self, handle: DownloadHandle) -> bool {
        self.shared
            .transfers()
            .get(&handle)
            .is_some_and(|transfer| !transfer.running && transfer.can_resume())
    }
}
