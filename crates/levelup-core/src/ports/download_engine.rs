//! Host download engine port.
//!
//! The engine transfers bytes; the update pipeline only issues commands and
//! consumes the [`HostEvent`](crate::host::HostEvent) stream the engine
//! produces. Commands never block: their effects arrive later as events.

use std::collections::BTreeMap;
use std::path::Path;

use crate::host::DownloadHandle;

/// Commands the update pipeline issues to the host download engine.
///
/// A `start_download` is answered by an `Attached` event carrying the new
/// handle; the orchestrator then calls `set_save_path` (or `reject`) for it.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
pub trait DownloadEnginePort: Send + Sync {
    /// Begin transferring `url`.
    fn start_download(&self, url: &str, headers: &BTreeMap<String, String>);

    /// Choose where an attached download is written.
    fn set_save_path(&self, handle: DownloadHandle, path: &Path);

    /// Drop an attached download the pipeline does not manage.
    fn reject(&self, handle: DownloadHandle);

    fn pause(&self, handle: DownloadHandle);

    fn resume(&self, handle: DownloadHandle);

    fn cancel(&self, handle: DownloadHandle);

    /// Whether `resume` can continue from the current offset.
    fn can_resume(&self, handle: DownloadHandle) -> bool;
}
