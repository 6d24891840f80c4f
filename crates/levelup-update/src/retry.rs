//! Failure classification and retry planning.
//!
//! Pure functions over entry state; the manager applies their results.

use levelup_core::{
    DownloadHandle, DownloadStatus, InternalVersion, InterruptReason, ResourceEntry,
    StorageSample, UpdateEntry,
};

/// Reason for an in-flight interruption, in priority order: user pause,
/// disk space below `threshold_bytes`, then the previously recorded server
/// error (or a bare server error).
pub fn classify_interruption(
    is_paused: bool,
    sample: Option<StorageSample>,
    threshold_bytes: u64,
    previous: &InterruptReason,
) -> InterruptReason {
    if is_paused {
        InterruptReason::Pause
    } else {
        classify_failure(sample, threshold_bytes, previous)
    }
}

/// Reason for a transfer that ended interrupted: disk space first, then the
/// server error already on record.
pub fn classify_failure(
    sample: Option<StorageSample>,
    threshold_bytes: u64,
    previous: &InterruptReason,
) -> InterruptReason {
    if sample.is_some_and(|s| s.is_below(threshold_bytes)) {
        InterruptReason::NotEnoughSpaceForDownload
    } else if matches!(previous, InterruptReason::ServerError(_)) {
        previous.clone()
    } else {
        InterruptReason::ServerError(None)
    }
}

/// First resource whose install stopped in a failure state.
pub fn find_first_erroring_install(entry: &UpdateEntry) -> Option<usize> {
    entry
        .resources
        .iter()
        .position(|r| r.install.status.is_failure())
}

/// First resource whose download is interrupted.
pub fn find_first_erroring_download(entry: &UpdateEntry) -> Option<usize> {
    entry
        .resources
        .iter()
        .position(|r| r.download.status == DownloadStatus::Interrupted)
}

/// How an interrupted download is brought back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadRetry {
    /// Continue the existing host item from its current offset.
    Resume(DownloadHandle),
    /// Issue a fresh download of the URL.
    Restart(String),
}

/// Resume when the host still holds a resumable item, otherwise restart
/// from the resource's own URL.
pub fn plan_download_retry(
    resource: &ResourceEntry,
    can_resume: impl FnOnce(DownloadHandle) -> bool,
) -> DownloadRetry {
    match resource.handle {
        Some(handle) if can_resume(handle) => DownloadRetry::Resume(handle),
        _ => DownloadRetry::Restart(resource.download_url.clone()),
    }
}

/// What a retry call triggered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryOutcome {
    /// Resource whose install was restarted.
    pub install: Option<InternalVersion>,
    /// Resource whose download was resumed or restarted.
    pub download: Option<(InternalVersion, DownloadRetry)>,
}

impl RetryOutcome {
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.install.is_none() && self.download.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use levelup_core::{GameId, InstallStatus, Resource, UpdateRequest};
    use std::path::PathBuf;

    const MIB: u64 = 1024 * 1024;

    fn sample(available_bytes: u64) -> Option<StorageSample> {
        Some(StorageSample {
            available_bytes,
            total_bytes: 100 * MIB,
        })
    }

    fn entry(count: u64) -> UpdateEntry {
        UpdateEntry::new(
            UpdateRequest {
                game_id: GameId::new("g"),
                title: "G".into(),
                target_directory: PathBuf::from("/g"),
                runnable_path: PathBuf::from("g"),
                should_create_shortcut: false,
                resources: (1..=count)
                    .map(|v| Resource {
                        internal_version: InternalVersion::Number(v),
                        is_full_package: false,
                        patch_url: format!("https://cdn/{v}.zip"),
                        patch_metadata_url: format!("https://cdn/{v}.json"),
                        patch_size_bytes: 1,
                    })
                    .collect(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_pause_wins_over_disk_space() {
        let reason = classify_interruption(true, sample(0), 20 * MIB, &InterruptReason::None);
        assert_eq!(reason, InterruptReason::Pause);
    }

    #[test]
    fn test_low_disk_space_wins_over_server_error() {
        let reason = classify_interruption(
            false,
            sample(MIB),
            20 * MIB,
            &InterruptReason::server_error("net::ERR_FAILED"),
        );
        assert_eq!(reason, InterruptReason::NotEnoughSpaceForDownload);
    }

    #[test]
    fn test_server_error_detail_is_kept() {
        let previous = InterruptReason::server_error("net::ERR_CONNECTION_RESET");
        assert_eq!(
            classify_interruption(false, sample(50 * MIB), 20 * MIB, &previous),
            previous
        );
        assert_eq!(
            classify_failure(None, 20 * MIB, &InterruptReason::Pause),
            InterruptReason::ServerError(None)
        );
    }

    #[test]
    fn test_finds_first_erroring_resources() {
        let mut e = entry(3);
        assert_eq!(find_first_erroring_install(&e), None);
        assert_eq!(find_first_erroring_download(&e), None);

        e.resources[1].install.status = InstallStatus::InvalidFile;
        e.resources[2].install.status = InstallStatus::UnzipFailed;
        e.resources[2].download.status = DownloadStatus::Interrupted;
        assert_eq!(find_first_erroring_install(&e), Some(1));
        assert_eq!(find_first_erroring_download(&e), Some(2));
    }

    #[test]
    fn test_download_retry_prefers_resume() {
        let mut e = entry(1);
        let resource = &mut e.resources[0];
        assert_eq!(
            plan_download_retry(resource, |_| true),
            DownloadRetry::Restart("https://cdn/1.zip".into())
        );

        resource.handle = Some(DownloadHandle::new(4));
        assert_eq!(
            plan_download_retry(resource, |_| true),
            DownloadRetry::Resume(DownloadHandle::new(4))
        );
        assert_eq!(
            plan_download_retry(resource, |_| false),
            DownloadRetry::Restart("https://cdn/1.zip".into())
        );
    }
}
