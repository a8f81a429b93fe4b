//! # Events emitted by the engine.
//!
//! The [`EventKind`] enum classifies events into:
//! - **Graph events**: manifolds installed, replaced, uninstalled
//! - **Worker lifecycle**: starting, started, start failures, stops, failures, bounces
//! - **Engine events**: fatal errors and the shutdown sequence
//! - **Subscriber events**: overflow and panics in subscriber workers
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use depvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::WorkerFailed)
//!     .with_manifold("api-caller")
//!     .with_generation(3)
//!     .with_reason("connection refused");
//!
//! assert_eq!(ev.kind, EventKind::WorkerFailed);
//! assert_eq!(ev.manifold.as_deref(), Some("api-caller"));
//! assert_eq!(ev.generation, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of engine events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Graph events ===
    /// A new manifold was installed.
    ///
    /// Sets: `manifold`.
    ManifoldInstalled,

    /// An installed manifold was replaced by a new definition.
    ///
    /// Sets: `manifold`.
    ManifoldReplaced,

    /// A manifold was removed from the graph (after its worker stopped).
    ///
    /// Sets: `manifold`, `reason` when removal was requested by the worker.
    ManifoldUninstalled,

    // === Worker lifecycle ===
    /// Start routine invoked.
    ///
    /// Sets: `manifold`.
    ManifoldStarting,

    /// Start routine returned a worker, now visible to dependents.
    ///
    /// Sets: `manifold`, `generation`.
    ManifoldStarted,

    /// Start routine failed.
    ///
    /// Sets: `manifold`, `reason` (error after filtering).
    StartFailed,

    /// Worker stopped cleanly (or after being asked to).
    ///
    /// Sets: `manifold`, `generation`.
    WorkerStopped,

    /// Worker stopped with an error.
    ///
    /// Sets: `manifold`, `generation`, `reason`.
    WorkerFailed,

    /// Manifold will be restarted after `delay_ms` because it bounced.
    ///
    /// Sets: `manifold`, `delay_ms`.
    WorkerBounced,

    /// Running dependents were asked to stop because an input changed.
    ///
    /// Sets: `manifold` (the changed input), `reason` (comma-separated dependents).
    DependentsInvalidated,

    // === Engine events ===
    /// A critical manifold failed; the engine is going down.
    ///
    /// Sets: `manifold`, `reason`.
    EngineFatal,

    /// Shutdown requested (kill or fatal error).
    ShutdownRequested,

    /// All workers stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some workers did not stop in time.
    ///
    /// Sets: `delay_ms` (the grace), `reason` (stuck manifolds).
    GraceExceeded,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `manifold` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `manifold` (subscriber name), `reason`.
    SubscriberOverflow,
}

/// Engine event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Manifold (or subscriber) name, if applicable.
    pub manifold: Option<Arc<str>>,
    /// Worker generation, if applicable.
    pub generation: Option<u64>,
    /// Human-readable reason (errors, dependents, overflow details).
    pub reason: Option<Arc<str>>,
    /// Delay or grace in milliseconds (compact).
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            manifold: None,
            generation: None,
            reason: None,
            delay_ms: None,
        }
    }

    /// Attaches a manifold name.
    #[inline]
    pub fn with_manifold(mut self, name: impl Into<Arc<str>>) -> Self {
        self.manifold = Some(name.into());
        self
    }

    /// Attaches a worker generation.
    #[inline]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_manifold(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_manifold(subscriber)
            .with_reason(info)
    }

    /// True for events about a subscriber rather than a manifold.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}
