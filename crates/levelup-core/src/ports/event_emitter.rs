//! Update event emitter port.
//!
//! This port abstracts event delivery to the UI, allowing the pipeline to
//! emit events without coupling to transport details (IPC, terminal, etc.).

use tokio::sync::mpsc;

use crate::events::UpdateEvent;

/// Port for emitting update events.
///
/// Implementations must not call back into the update manager from `emit`.
pub trait UpdateEventEmitterPort: Send + Sync {
    /// Emit an update event. This method should not block.
    fn emit(&self, event: UpdateEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn UpdateEventEmitterPort>;
}

/// A no-op emitter for tests and headless contexts.
#[derive(Debug, Clone, Default)]
pub struct NoopUpdateEmitter;

impl NoopUpdateEmitter {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl UpdateEventEmitterPort for NoopUpdateEmitter {
    fn emit(&self, _event: UpdateEvent) {
        // Intentionally do nothing
    }

    fn clone_box(&self) -> Box<dyn UpdateEventEmitterPort> {
        Box::new(self.clone())
    }
}

/// Forwards events into an unbounded tokio channel.
///
/// Events emitted after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelUpdateEmitter {
    tx: mpsc::UnboundedSender<UpdateEvent>,
}

impl ChannelUpdateEmitter {
    /// Create an emitter and the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UpdateEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl UpdateEventEmitterPort for ChannelUpdateEmitter {
    fn emit(&self, event: UpdateEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!(target: "levelup.events", "update event receiver dropped");
        }
    }

    fn clone_box(&self) -> Box<dyn UpdateEventEmitterPort> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_noop_emitter_clone_box() {
        let emitter = NoopUpdateEmitter::new();
        emitter.emit(UpdateEvent::list_changed(Vec::new()));
        let _boxed: Box<dyn UpdateEventEmitterPort> = emitter.clone_box();
    }

    #[test]
    fn test_channel_emitter_forwards_and_survives_drop() {
        let (emitter, mut rx) = ChannelUpdateEmitter::channel();
        let emitter: Arc<dyn UpdateEventEmitterPort> = Arc::new(emitter);
        emitter.emit(UpdateEvent::list_changed(Vec::new()));
        assert_eq!(
            rx.try_recv().map(|e| e.event_name()),
            Ok("update:list-changed")
        );
        drop(rx);
        emitter.emit(UpdateEvent::list_changed(Vec::new()));
    }
}
