//! Free-space probe port.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Space figures of the volume holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSample {
    pub available_bytes: u64,
    pub total_bytes: u64,
}

impl StorageSample {
    /// Whether free space has dropped below `threshold_bytes`.
    #[must_use]
    pub const fn is_below(&self, threshold_bytes: u64) -> bool {
        self.available_bytes < threshold_bytes
    }
}

/// Samples free space for a path.
///
/// Returns `None` when no mounted volume can be matched; callers then fall
/// back to a generic failure classification.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
pub trait StorageProbePort: Send + Sync {
    fn sample(&self, path: &Path) -> Option<StorageSample>;
}

/// Probe reporting a fixed sample, for tests and simulations.
#[derive(Debug, Clone, Copy)]
pub struct FixedStorageProbe(pub Option<StorageSample>);

impl FixedStorageProbe {
    /// Probe that always reports `available_bytes` free.
    #[must_use]
    pub const fn available(available_bytes: u64) -> Self {
        Self(Some(StorageSample {
            available_bytes,
            total_bytes: available_bytes,
        }))
    }
}

impl StorageProbePort for FixedStorageProbe {
    fn sample(&self, _path: &Path) -> Option<StorageSample> {
        self.0
    }
}
