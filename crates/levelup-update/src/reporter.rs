//! Progress reporting.
//!
//! Mutations of a registry entry go through [`ProgressReporter`], which
//! emits a full snapshot of the entry after every change. Emission is
//! driven by the mutation itself, never by a timer; rate limiting, when
//! wanted, belongs to the event source.

use std::sync::Arc;

use levelup_core::{GameId, UpdateEntry, UpdateEvent, UpdateEventEmitterPort};
use uuid::Uuid;

use crate::registry::UpdateRegistry;

/// Registry writer that pushes a snapshot to the UI after each mutation.
#[derive(Clone)]
pub struct ProgressReporter {
    registry: Arc<UpdateRegistry>,
    emitter: Arc<dyn UpdateEventEmitterPort>,
}

impl ProgressReporter {
    pub fn new(registry: Arc<UpdateRegistry>, emitter: Arc<dyn UpdateEventEmitterPort>) -> Self {
        Self { registry, emitter }
    }

    pub fn registry(&self) -> &Arc<UpdateRegistry> {
        &self.registry
    }

    /// Mutate the entry of `game_id` and push its snapshot.
    ///
    /// Returns `None` (and pushes nothing) when the game has no entry.
    pub fn report<R>(&self, game_id: &GameId, f: impl FnOnce(&mut UpdateEntry) -> R) -> Option<R> {
        let (result, snapshot) = self.registry.with_entry(game_id, |entry| {
            let result = f(entry);
            (result, entry.snapshot())
        })?;
        self.emitter.emit(UpdateEvent::progress(snapshot));
        Some(result)
    }

    /// Like [`report`](Self::report), but only while the entry still belongs
    /// to `operation_id`.
    pub fn report_operation<R>(
        &self,
        game_id: &GameId,
        operation_id: Uuid,
        f: impl FnOnce(&mut UpdateEntry) -> R,
    ) -> Option<R> {
        let (result, snapshot) = self.registry.with_operation(game_id, operation_id, |entry| {
            let result = f(entry);
            (result, entry.snapshot())
        })?;
        self.emitter.emit(UpdateEvent::progress(snapshot));
        Some(result)
    }

    /// Push the list of live entries.
    pub fn push_list(&self) {
        self.emitter
            .emit(UpdateEvent::list_changed(self.registry.snapshots()));
    }
}
