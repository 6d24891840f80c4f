//! In-memory registry of live update operations.
//!
//! One [`UpdateEntry`] per game. Every access goes through a closure run
//! under a synchronous lock; closures never await, so readers always observe
//! a fully constructed entry and writers for one game are serialized.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use levelup_core::{DownloadHandle, GameId, UpdateEntry, UpdateProgressSnapshot};
use uuid::Uuid;

/// Registry of in-flight updates, keyed by game.
#[derive(Debug, Default)]
pub struct UpdateRegistry {
    entries: Mutex<HashMap<GameId, UpdateEntry>>,
}

impl UpdateRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<GameId, UpdateEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `entry` unless the game already has an unfinished one.
    ///
    /// A finished entry still awaiting acknowledgement is replaced.
    /// Returns `false` when an unfinished entry blocked the insert.
    pub fn create(&self, entry: UpdateEntry) -> bool {
        let mut entries = self.lock();
        if entries
            .get(&entry.game_id)
            .is_some_and(|existing| !existing.is_finished())
        {
            return false;
        }
        entries.insert(entry.game_id.clone(), entry);
        true
    }

    /// Copy of the entry for `game_id`.
    pub fn get(&self, game_id: &GameId) -> Option<UpdateEntry> {
        self.lock().get(game_id).cloned()
    }

    pub fn remove(&self, game_id: &GameId) -> Option<UpdateEntry> {
        self.lock().remove(game_id)
    }

    pub fn contains(&self, game_id: &GameId) -> bool {
        self.lock().contains_key(game_id)
    }

    /// Run `f` against the entry of `game_id`.
    pub fn with_entry<R>(&self, game_id: &GameId, f: impl FnOnce(&mut UpdateEntry) -> R) -> Option<R> {
        self.lock().get_mut(game_id).map(f)
    }

    /// Run `f` only if the entry of `game_id` still belongs to `operation_id`.
    ///
    /// Long-running work resumes through this so that a cancel followed by a
    /// fresh start never receives stale writes.
    pub fn with_operation<R>(
        &self,
        game_id: &GameId,
        operation_id: Uuid,
        f: impl FnOnce(&mut UpdateEntry) -> R,
    ) -> Option<R> {
        self.lock()
            .get_mut(game_id)
            .filter(|entry| entry.operation_id == operation_id)
            .map(f)
    }

    /// Remove the entry of `game_id` when `remove` accepts it.
    pub fn remove_if(
        &self,
        game_id: &GameId,
        remove: impl FnOnce(&UpdateEntry) -> bool,
    ) -> Option<UpdateEntry> {
        let mut entries = self.lock();
        if entries.get(game_id).is_some_and(remove) {
            entries.remove(game_id)
        } else {
            None
        }
    }

    /// Game and resource index bound to a host handle.
    pub fn find_by_handle(&self, handle: DownloadHandle) -> Option<(GameId, usize)> {
        self.lock().values().find_map(|entry| {
            entry
                .index_of_handle(handle)
                .map(|index| (entry.game_id.clone(), index))
        })
    }

    /// Game and resource index whose download URL prefixes `url`.
    pub fn find_by_url(&self, url: &str) -> Option<(GameId, usize)> {
        self.lock().values().find_map(|entry| {
            entry
                .index_for_url(url)
                .map(|index| (entry.game_id.clone(), index))
        })
    }

    pub fn game_ids(&self) -> Vec<GameId> {
        let mut ids: Vec<GameId> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Snapshots of all live entries, ordered by game id.
    pub fn snapshots(&self) -> Vec<UpdateProgressSnapshot> {
        let entries = self.lock();
        let mut snapshots: Vec<UpdateProgressSnapshot> =
            entries.values().map(UpdateEntry::snapshot).collect();
        snapshots.sort_by(|a, b| a.game_id.cmp(&b.game_id));
        snapshots
    }
}
