//! # Bus: broadcast channel for engine events.
//!
//! The control loop and the subscriber lanes publish into one
//! [`tokio::sync::broadcast`] ring. Two kinds of receiver read it: the
//! engine's fan-out listener, which feeds the [`SubscriberSet`](crate::SubscriberSet),
//! and any receiver handed out by [`Engine::subscribe`](crate::Engine::subscribe).
//!
//! ```text
//! event loop ─┐                ┌─► fan-out listener ─► SubscriberSet
//!             ├─► Bus (ring) ──┤
//! lanes ──────┘                └─► Engine::subscribe()
//! ```
//!
//! Publishing never waits. Events sent while nobody listens are gone. A
//! receiver that falls more than `capacity` events behind gets
//! `RecvError::Lagged(n)` and resumes at the oldest retained event.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable publishing handle over a shared event ring.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus retaining up to `capacity` events (at least one).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Sends `ev` to every current receiver; a bus without receivers drops it.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Opens a receiver that sees events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of receivers currently open.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
