//! # SubscriberSet: per-subscriber delivery lanes.
//!
//! Every [`Subscribe`] implementation gets its own lane: a bounded queue
//! drained by a dedicated tokio task. [`SubscriberSet::emit`] only ever uses
//! `try_send`, so a slow subscriber costs the fan-out listener nothing.
//!
//! ```text
//! emit(ev) ──► lane "log"     [queue] ──► LogWriter::on_event
//!          ├─► lane "metrics" [queue] ──► Metrics::on_event
//!          └─► lane ...
//!
//! full queue   ─► event dropped for that lane, SubscriberOverflow on the bus
//! panic        ─► SubscriberPanicked on the bus, lane keeps draining
//! ```
//!
//! Within a lane events arrive in bus order. Lanes are independent of each
//! other. Panics are caught with `AssertUnwindSafe`; a subscriber that
//! panics while holding its own lock may poison it.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::core::panic_message;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct Lane {
    name: &'static str,
    queue: mpsc::Sender<Arc<Event>>,
    task: JoinHandle<()>,
}

impl Lane {
    fn open(sub: Arc<dyn Subscribe>, bus: Bus) -> Self {
        let name = sub.name();
        let (queue, mut pending) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));

        let task = tokio::spawn(async move {
            while let Some(ev) = pending.recv().await {
                let delivered = std::panic::AssertUnwindSafe(sub.on_event(&ev))
                    .catch_unwind()
                    .await;
                if let Err(payload) = delivered {
                    bus.publish(Event::subscriber_panicked(
                        name,
                        panic_message(payload.as_ref()),
                    ));
                }
            }
        });

        Self { name, queue, task }
    }
}

/// Fan-out of bus events to a fixed group of subscribers.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    bus: Bus,
}

impl SubscriberSet {
    /// Opens one lane per subscriber. Lanes start draining immediately.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let lanes = subs
            .into_iter()
            .map(|sub| Lane::open(sub, bus.clone()))
            .collect();
        Self { lanes, bus }
    }

    /// Queues `event` on every lane without waiting.
    ///
    /// A lane that is full or closed loses the event and a `SubscriberOverflow`
    /// is published instead, except for overflow events themselves.
    pub fn emit(&self, event: &Event) {
        let shared = Arc::new(event.clone());
        let report_drops = event.kind != EventKind::SubscriberOverflow;

        for lane in &self.lanes {
            let reason = match lane.queue.try_send(Arc::clone(&shared)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            if report_drops {
                self.bus.publish(Event::subscriber_overflow(lane.name, reason));
            }
        }
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    /// True if the set has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Closes every lane and waits until each has delivered what it already queued.
    pub async fn shutdown(self) {
        let tasks: Vec<_> = self
            .lanes
            .into_iter()
            .map(|Lane { queue, task, .. }| {
                drop(queue);
                task
            })
            .collect();
        for task in tasks {
            let _ = task.await;
        }
    }
}
