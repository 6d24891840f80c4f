//! Per-resource download and install state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a resource download as reported by the host engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DownloadStatus {
    #[default]
    Initializing,
    Progressing,
    Interrupted,
    Completed,
    Cancelled,
}

/// Why a download stopped transferring.
///
/// Serialises to the flat strings the launcher UI understands: `""`,
/// `"pause"`, `"notEnoughSpaceForDownload"`, `"serverError"` (optionally
/// followed by `" - <detail>"`) and `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InterruptReason {
    #[default]
    None,
    Pause,
    NotEnoughSpaceForDownload,
    /// Network or server failure, with the host error code when known.
    ServerError(Option<String>),
    Unknown,
}

impl InterruptReason {
    const SERVER_ERROR: &'static str = "serverError";

    /// Server error carrying a host error code.
    pub fn server_error(detail: impl Into<String>) -> Self {
        Self::ServerError(Some(detail.into()))
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for InterruptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Pause => f.write_str("pause"),
            Self::NotEnoughSpaceForDownload => f.write_str("notEnoughSpaceForDownload"),
            Self::ServerError(None) => f.write_str(Self::SERVER_ERROR),
            Self::ServerError(Some(detail)) => write!(f, "{} - {detail}", Self::SERVER_ERROR),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

impl From<InterruptReason> for String {
    fn from(value: InterruptReason) -> Self {
        value.to_string()
    }
}

impl From<String> for InterruptReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" => Self::None,
            "pause" => Self::Pause,
            "notEnoughSpaceForDownload" => Self::NotEnoughSpaceForDownload,
            Self::SERVER_ERROR => Self::ServerError(None),
            other => other
                .strip_prefix("serverError - ")
                .map_or(Self::Unknown, Self::server_error),
        }
    }
}

/// Download progress of one resource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadState {
    pub status: DownloadStatus,
    pub transferred_bytes: u64,
    pub total_bytes: u64,
    pub bytes_per_second: u64,
    pub percent: f64,
    pub is_paused: bool,
    pub interrupt_reason: InterruptReason,
    pub remaining_seconds: u64,
    pub remaining_minutes: u64,
    /// Human readable estimate, e.g. `"3m 12s"`.
    pub remaining_time: String,
    /// Free space of the target volume sampled at the last interruption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_space_bytes: Option<u64>,
}

impl DownloadState {
    /// Fresh state seeded with the advertised archive size.
    #[must_use]
    pub fn initial(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            ..Self::default()
        }
    }

    /// Copy byte counters from the host engine and refresh the time estimate.
    pub fn apply_progress(
        &mut self,
        transferred_bytes: u64,
        total_bytes: u64,
        bytes_per_second: u64,
        percent: f64,
        is_paused: bool,
    ) {
        self.transferred_bytes = transferred_bytes;
        if total_bytes > 0 {
            self.total_bytes = total_bytes;
        }
        self.bytes_per_second = bytes_per_second;
        self.percent = percent.clamp(0.0, 100.0);
        self.is_paused = is_paused;

        let remaining = RemainingTime::estimate(
            self.total_bytes.saturating_sub(transferred_bytes),
            bytes_per_second,
        );
        self.remaining_seconds = remaining.seconds;
        self.remaining_minutes = remaining.minutes;
        self.remaining_time = remaining.to_string();
    }
}

/// Time-to-completion estimate split for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemainingTime {
    /// Whole minutes.
    pub minutes: u64,
    /// Seconds past the whole minutes.
    pub seconds: u64,
}

impl RemainingTime {
    /// Estimate from remaining bytes and current speed; zero when stalled.
    #[must_use]
    pub const fn estimate(remaining_bytes: u64, bytes_per_second: u64) -> Self {
        if bytes_per_second == 0 {
            return Self {
                minutes: 0,
                seconds: 0,
            };
        }
        let total = remaining_bytes.div_ceil(bytes_per_second);
        Self {
            minutes: total / 60,
            seconds: total % 60,
        }
    }
}

impl fmt::Display for RemainingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minutes > 0 {
            write!(f, "{}m {}s", self.minutes, self.seconds)
        } else {
            write!(f, "{}s", self.seconds)
        }
    }
}

/// Install lifecycle of one resource.
///
/// Serialised with the display labels the launcher UI keys its copy on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InstallStatus {
    #[default]
    Downloading,
    Downloaded,
    Unzipping,
    #[serde(rename = "Unzip Success")]
    UnzipSuccess,
    #[serde(rename = "Unzip Failed")]
    UnzipFailed,
    #[serde(rename = "Valid File")]
    ValidFile,
    #[serde(rename = "Invalid File")]
    InvalidFile,
    #[serde(rename = "Removing Files")]
    RemovingFiles,
    #[serde(rename = "Removing Files Failed")]
    RemovingFilesFailed,
    #[serde(rename = "Adding Files")]
    AddingFiles,
    #[serde(rename = "Adding Files Failed")]
    AddingFilesFailed,
    #[serde(rename = "Game Info Set")]
    GameInfoSet,
    #[serde(rename = "Deeplink Registered")]
    DeeplinkRegistered,
}

impl InstallStatus {
    /// Whether the following resource's install may begin.
    #[must_use]
    pub const fn unblocks_next(self) -> bool {
        matches!(
            self,
            Self::ValidFile | Self::GameInfoSet | Self::DeeplinkRegistered
        )
    }

    /// Failure states a user-triggered retry restarts from.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(
            self,
            Self::UnzipFailed
                | Self::InvalidFile
                | Self::RemovingFilesFailed
                | Self::AddingFilesFailed
        )
    }

    #[must_use]
    pub const fn is_terminal_success(self) -> bool {
        matches!(self, Self::DeeplinkRegistered)
    }

    /// Not yet handed to the install pipeline.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Downloading | Self::Downloaded)
    }
}

/// Why extraction stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnzipInterruptReason {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "notEnoughSpaceForUnzip")]
    NotEnoughSpaceForUnzip,
    #[serde(rename = "unknown")]
    Unknown,
}

/// Extraction progress, measured in compressed bytes consumed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnzipProgress {
    pub unzipped_bytes: u64,
    pub total_bytes: u64,
    pub percent: f64,
    pub interrupt_reason: UnzipInterruptReason,
}

impl UnzipProgress {
    #[must_use]
    pub fn initial(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            ..Self::default()
        }
    }

    /// Progress after `unzipped_bytes` of `total_bytes`.
    #[must_use]
    pub fn at(unzipped_bytes: u64, total_bytes: u64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let percent = if total_bytes == 0 {
            0.0
        } else {
            (unzipped_bytes as f64 / total_bytes as f64 * 100.0).min(100.0)
        };
        Self {
            unzipped_bytes,
            total_bytes,
            percent,
            interrupt_reason: UnzipInterruptReason::None,
        }
    }
}

/// Install progress of one resource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallState {
    pub status: InstallStatus,
    pub unzip_progress: UnzipProgress,
}

impl InstallState {
    #[must_use]
    pub fn initial(total_bytes: u64) -> Self {
        Self {
            status: InstallStatus::Downloading,
            unzip_progress: UnzipProgress::initial(total_bytes),
        }
    }
}
