//! Lifecycle events produced by the host download engine.
//!
//! The engine that moves bytes lives outside this workspace; it reports what
//! happens to each transfer through [`HostEvent`] values sent over a channel
//! and is driven through [`crate::ports::DownloadEnginePort`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a host engine download item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadHandle(u64);

impl DownloadHandle {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DownloadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// State carried by an in-flight `Updated` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Progressing,
    Interrupted,
}

/// Final state carried by a `Done` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneState {
    Completed,
    Cancelled,
    Interrupted,
}

/// Byte counters reported alongside every transfer event.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TransferProgress {
    pub received_bytes: u64,
    /// Zero when the server did not announce a length.
    pub total_bytes: u64,
    pub bytes_per_second: u64,
    pub percent: f64,
    pub is_paused: bool,
    pub can_resume: bool,
}

impl TransferProgress {
    /// Progress with `percent` derived from the byte counters.
    #[must_use]
    pub fn new(received_bytes: u64, total_bytes: u64, bytes_per_second: u64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let percent = if total_bytes == 0 {
            0.0
        } else {
            received_bytes as f64 / total_bytes as f64 * 100.0
        };
        Self {
            received_bytes,
            total_bytes,
            bytes_per_second,
            percent,
            is_paused: false,
            can_resume: false,
        }
    }

    #[must_use]
    pub const fn paused(mut self, is_paused: bool) -> Self {
        self.is_paused = is_paused;
        self
    }

    #[must_use]
    pub const fn resumable(mut self, can_resume: bool) -> Self {
        self.can_resume = can_resume;
        self
    }
}

/// Event emitted by the host download engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// The engine accepted a URL and exposes a handle for it.
    Attached { handle: DownloadHandle, url: String },
    /// Transfer progress or a resumable interruption.
    Updated {
        handle: DownloadHandle,
        state: TransferState,
        progress: TransferProgress,
    },
    /// The transfer reached a final state.
    Done {
        handle: DownloadHandle,
        state: DoneState,
        progress: TransferProgress,
    },
    /// Side-channel request failure, reported by URL only.
    RequestFailed { url: String, error_code: String },
}

impl HostEvent {
    pub fn attached(handle: DownloadHandle, url: impl Into<String>) -> Self {
        Self::Attached {
            handle,
            url: url.into(),
        }
    }

    #[must_use]
    pub const fn progressing(handle: DownloadHandle, progress: TransferProgress) -> Self {
        Self::Updated {
            handle,
            state: TransferState::Progressing,
            progress,
        }
    }

    #[must_use]
    pub const fn interrupted(handle: DownloadHandle, progress: TransferProgress) -> Self {
        Self::Updated {
            handle,
            state: TransferState::Interrupted,
            progress,
        }
    }

    #[must_use]
    pub const fn done(handle: DownloadHandle, state: DoneState, progress: TransferProgress) -> Self {
        Self::Done {
            handle,
            state,
            progress,
        }
    }

    pub fn request_failed(url: impl Into<String>, error_code: impl Into<String>) -> Self {
        Self::RequestFailed {
            url: url.into(),
            error_code: error_code.into(),
        }
    }

    /// Get the event name for logging.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Attached { .. } => "host:attached",
            Self::Updated { .. } => "host:updated",
            Self::Done { .. } => "host:done",
            Self::RequestFailed { .. } => "host:request_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_progress_percent() {
        let p = TransferProgress::new(50, 200, 10).paused(true);
        assert!((p.percent - 25.0).abs() < f64::EPSILON);
        assert!(p.is_paused);
        assert!((TransferProgress::new(50, 0, 10).percent).abs() < f64::EPSILON);
    }

    #[test]
    fn test_host_event_serialization() {
        let event = HostEvent::attached(DownloadHandle::new(3), "https://cdn/a.zip");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "attached");
        assert_eq!(json["handle"], 3);
        assert_eq!(event.event_name(), "host:attached");
    }
}
