//! Terminal rendering of update progress.
//!
//! One `indicatif` bar follows the resource the snapshot focuses on: bytes
//! while it downloads, compressed bytes while it unzips, and a status line for
//! the short steps after that.

use indicatif::{ProgressBar, ProgressStyle};
use levelup_core::{
    DownloadStatus, InstallStatus, InterruptReason, ResourceSnapshot, UpdateProgressSnapshot,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Download,
    Unzip,
    Finalize,
}

fn phase_of(resource: &ResourceSnapshot) -> Phase {
    match resource.install.status {
        InstallStatus::Downloading if resource.download.status != DownloadStatus::Completed => {
            Phase::Download
        }
        InstallStatus::Unzipping => Phase::Unzip,
        _ => Phase::Finalize,
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
        )
        .map_or_else(|_| ProgressStyle::default_bar(), |style| style.progress_chars("█▓░"))
}

fn status_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Display label of an install status.
pub const fn install_label(status: InstallStatus) -> &'static str {
    match status {
        InstallStatus::Downloading => "downloading",
        InstallStatus::Downloaded => "downloaded",
        InstallStatus::Unzipping => "unzipping",
        InstallStatus::UnzipSuccess => "unzipped",
        InstallStatus::UnzipFailed => "unzip failed",
        InstallStatus::ValidFile => "executable verified",
        InstallStatus::InvalidFile => "executable missing",
        InstallStatus::RemovingFiles => "removing files",
        InstallStatus::RemovingFilesFailed => "removing files failed",
        InstallStatus::AddingFiles => "adding files",
        InstallStatus::AddingFilesFailed => "adding files failed",
        InstallStatus::GameInfoSet => "game info saved",
        InstallStatus::DeeplinkRegistered => "installed",
    }
}

/// One-line summary of the focused resource, e.g. `[2/3] v12 unzipping`.
pub fn describe(snapshot: &UpdateProgressSnapshot) -> String {
    let Some(resource) = snapshot.current() else {
        return snapshot.title.clone();
    };
    let position = format!(
        "[{}/{}] v{}",
        snapshot.current_index + 1,
        snapshot.resources.len(),
        resource.internal_version
    );
    let download = &resource.download;
    if download.status == DownloadStatus::Interrupted {
        return match &download.interrupt_reason {
            InterruptReason::Pause => format!("{position} paused"),
            InterruptReason::None => format!("{position} interrupted"),
            reason => format!("{position} interrupted ({reason})"),
        };
    }
    if phase_of(resource) == Phase::Download && download.remaining_seconds > 0 {
        return format!("{position} downloading, {} left", download.remaining_time);
    }
    format!("{position} {}", install_label(resource.install.status))
}

/// Progress bar bound to one update operation.
pub struct ProgressView {
    bar: ProgressBar,
    focus: Option<(usize, Phase)>,
}

impl ProgressView {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(0))
    }

    /// A view that draws nothing.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        bar.set_style(status_style());
        Self { bar, focus: None }
    }

    pub fn render(&mut self, snapshot: &UpdateProgressSnapshot) {
        let Some(resource) = snapshot.current() else {
            return;
        };
        let phase = phase_of(resource);
        if self.focus != Some((snapshot.current_index, phase)) {
            self.focus = Some((snapshot.current_index, phase));
            self.bar.reset();
            self.bar.set_style(if phase == Phase::Finalize {
                status_style()
            } else {
                bar_style()
            });
        }

        match phase {
            Phase::Download => {
                self.bar.set_length(resource.download.total_bytes);
                self.bar.set_position(resource.download.transferred_bytes);
            }
            Phase::Unzip => {
                let unzip = &resource.install.unzip_progress;
                self.bar.set_length(unzip.total_bytes);
                self.bar.set_position(unzip.unzipped_bytes);
            }
            Phase::Finalize => self.bar.tick(),
        }
        self.bar.set_message(describe(snapshot));
    }

    /// Print a line above the bar.
    pub fn note(&self, line: impl AsRef<str>) {
        self.bar.println(line.as_ref());
    }

    pub fn finish(&self, message: impl Into<String>) {
        self.bar.set_style(status_style());
        self.bar.finish_with_message(message.into());
    }

    pub fn abandon(&self, message: impl Into<String>) {
        self.bar.set_style(status_style());
        self.bar.abandon_with_message(message.into());
    }
}

impl Default for ProgressView {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use levelup_core::{DownloadState, GameId, InstallState, InternalVersion};
    use uuid::Uuid;

    fn snapshot(download: DownloadState, install: InstallStatus) -> UpdateProgressSnapshot {
        let mut install_state = InstallState::initial(100);
        install_state.status = install;
        UpdateProgressSnapshot {
            operation_id: Uuid::nil(),
            game_id: GameId::new("moonfall"),
            title: "Moonfall".into(),
            download_init_time: Utc::now(),
            current_index: 1,
            is_finished: false,
            resources: vec![
                ResourceSnapshot {
                    internal_version: InternalVersion::Number(1),
                    is_full_package: true,
                    download: DownloadState::initial(100),
                    install: InstallState::initial(100),
                },
                ResourceSnapshot {
                    internal_version: InternalVersion::Number(2),
                    is_full_package: false,
                    download,
                    install: install_state,
                },
            ],
        }
    }

    #[test]
    fn test_describe_statuses() {
        let s = snapshot(DownloadState::initial(100), InstallStatus::Unzipping);
        assert_eq!(describe(&s), "[2/2] v2 unzipping");

        let mut download = DownloadState::initial(100);
        download.status = DownloadStatus::Interrupted;
        download.interrupt_reason = InterruptReason::Pause;
        assert_eq!(
            describe(&snapshot(download.clone(), InstallStatus::Downloading)),
            "[2/2] v2 paused"
        );

        download.interrupt_reason = InterruptReason::NotEnoughSpaceForDownload;
        assert_eq!(
            describe(&snapshot(download, InstallStatus::Downloading)),
            "[2/2] v2 interrupted (notEnoughSpaceForDownload)"
        );
    }

    #[test]
    fn test_phase_follows_install_status() {
        let s = snapshot(DownloadState::initial(100), InstallStatus::Downloading);
        assert_eq!(phase_of(s.current().unwrap()), Phase::Download);

        let mut done = DownloadState::initial(100);
        done.status = DownloadStatus::Completed;
        let s = snapshot(done, InstallStatus::Downloading);
        assert_eq!(phase_of(s.current().unwrap()), Phase::Finalize);

        let s = snapshot(DownloadState::initial(100), InstallStatus::GameInfoSet);
        assert_eq!(phase_of(s.current().unwrap()), Phase::Finalize);
    }

    #[test]
    fn test_hidden_view_renders_every_phase() {
        let mut view = ProgressView::hidden();
        view.render(&snapshot(DownloadState::initial(100), InstallStatus::Downloading));
        view.render(&snapshot(DownloadState::initial(100), InstallStatus::Unzipping));
        view.render(&snapshot(DownloadState::initial(100), InstallStatus::DeeplinkRegistered));
        view.finish("done");
    }
}
