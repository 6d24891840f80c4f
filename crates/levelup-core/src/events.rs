//! Events pushed to the UI consumer.
//!
//! Every mutation of a registry entry is followed by an [`UpdateEvent::Progress`]
//! carrying a full snapshot of that entry, so consumers never have to merge
//! partial updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DownloadState, GameId, InstallState, InternalVersion};

/// Per-resource slice of a progress snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSnapshot {
    pub internal_version: InternalVersion,
    pub is_full_package: bool,
    pub download: DownloadState,
    pub install: InstallState,
}

/// Full view of one game's update operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgressSnapshot {
    pub operation_id: Uuid,
    pub game_id: GameId,
    pub title: String,
    pub download_init_time: DateTime<Utc>,
    pub current_index: usize,
    pub is_finished: bool,
    pub resources: Vec<ResourceSnapshot>,
}

impl UpdateProgressSnapshot {
    /// Resource the UI should show progress for.
    #[must_use]
    pub fn current(&self) -> Option<&ResourceSnapshot> {
        self.resources.get(self.current_index)
    }
}

/// Event delivered to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdateEvent {
    /// A tracked field of one entry changed.
    Progress { snapshot: UpdateProgressSnapshot },
    /// The set of live entries changed.
    ListChanged { entries: Vec<UpdateProgressSnapshot> },
}

impl UpdateEvent {
    #[must_use]
    pub const fn progress(snapshot: UpdateProgressSnapshot) -> Self {
        Self::Progress { snapshot }
    }

    #[must_use]
    pub const fn list_changed(entries: Vec<UpdateProgressSnapshot>) -> Self {
        Self::ListChanged { entries }
    }

    /// Get the event name for transport layers.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "update:progress",
            Self::ListChanged { .. } => "update:list-changed",
        }
    }
}
