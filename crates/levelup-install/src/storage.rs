//! `sysinfo`-backed free-space probe.

use std::path::{Path, PathBuf};

use levelup_core::{StorageProbePort, StorageSample};
use sysinfo::Disks;

/// Samples the mounted volume whose mount point is the longest prefix of
/// the probed path.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemStorageProbe;

impl SystemStorageProbe {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl StorageProbePort for SystemStorageProbe {
    fn sample(&self, path: &Path) -> Option<StorageSample> {
        let target = existing_ancestor(path);
        let disks = Disks::new_with_refreshed_list();

        let mut best: Option<(usize, StorageSample)> = None;
        for disk in disks.list() {
            let mount = disk.mount_point();
            if !target.starts_with(mount) {
                continue;
            }
            let score = mount.as_os_str().len();
            if best.as_ref().is_some_and(|(best_score, _)| *best_score >= score) {
                continue;
            }
            best = Some((
                score,
                StorageSample {
                    available_bytes: disk.available_space(),
                    total_bytes: disk.total_space(),
                },
            ));
        }

        let sample = best.map(|(_, sample)| sample);
        if sample.is_none() {
            tracing::debug!(target: "levelup.download", path = %path.display(), "no mounted volume matches path");
        }
        sample
    }
}

/// Closest existing ancestor, canonicalized so mount prefixes compare.
///
/// The save path of a download (and its parent workspace) may not exist yet.
fn existing_ancestor(path: &Path) -> PathBuf {
    path.ancestors()
        .find_map(|candidate| std::fs::canonicalize(candidate).ok())
        .unwrap_or_else(|| path.to_path_buf())
}
