//! # Subscribe: hook for engine lifecycle events.
//!
//! A subscriber receives every event the engine publishes, in bus order, on
//! its own lane (see [`SubscriberSet`](crate::subscribers::SubscriberSet)).
//! Handling can take as long as it needs: the control loop never waits for
//! it. If the lane's queue fills up, further events for that subscriber are
//! dropped and a `SubscriberOverflow` event is published.
//!
//! ## Example
//! ```rust
//! use depvisor::{Event, EventKind, Subscribe};
//!
//! struct RestartCounter(std::sync::atomic::AtomicU64);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for RestartCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::ManifoldStarted {
//!             self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "restart-counter" }
//!     fn queue_capacity(&self) -> usize { 512 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Receiver of engine events, driven from a dedicated tokio task.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    async fn on_event(&self, event: &Event);

    /// Name used in overflow and panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Lane queue size.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
