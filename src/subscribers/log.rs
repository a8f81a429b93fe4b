//! # LogWriter: events rendered through `tracing`.
//!
//! Enabled with the `logging` feature. Transitions log at `info`, failures
//! and shutdown trouble at `warn`/`error`, chatty events at `debug`. Install a
//! `tracing` subscriber (e.g. `tracing_subscriber::fmt`) in the host binary to
//! see them.
//!
//! ## Example output
//! ```text
//! INFO depvisor: manifold started manifold="api-caller" generation=1
//! WARN depvisor: worker failed manifold="address-updater" generation=2 reason="connection refused"
//! INFO depvisor: dependents invalidated manifold="api-caller" reason="address-updater,logger"
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that forwards engine events to `tracing`.
#[derive(Default, Debug, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let manifold = e.manifold.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::ManifoldInstalled => info!(target: "depvisor", manifold, "manifold installed"),
            EventKind::ManifoldReplaced => info!(target: "depvisor", manifold, "manifold replaced"),
            EventKind::ManifoldUninstalled => {
                info!(target: "depvisor", manifold, reason, "manifold uninstalled")
            }
            EventKind::ManifoldStarting => debug!(target: "depvisor", manifold, "starting manifold"),
            EventKind::ManifoldStarted => info!(
                target: "depvisor",
                manifold,
                generation = e.generation,
                "manifold started"
            ),
            EventKind::StartFailed => warn!(target: "depvisor", manifold, reason, "start failed"),
            EventKind::WorkerStopped => debug!(
                target: "depvisor",
                manifold,
                generation = e.generation,
                "worker stopped"
            ),
            EventKind::WorkerFailed => warn!(
                target: "depvisor",
                manifold,
                generation = e.generation,
                reason,
                "worker failed"
            ),
            EventKind::WorkerBounced => info!(
                target: "depvisor",
                manifold,
                delay_ms = e.delay_ms,
                "worker bounced"
            ),
            EventKind::DependentsInvalidated => {
                info!(target: "depvisor", manifold, reason, "dependents invalidated")
            }
            EventKind::EngineFatal => error!(target: "depvisor", manifold, reason, "engine fatal"),
            EventKind::ShutdownRequested => info!(target: "depvisor", "shutdown requested"),
            EventKind::AllStoppedWithin => info!(target: "depvisor", "all workers stopped"),
            EventKind::GraceExceeded => error!(
                target: "depvisor",
                grace_ms = e.delay_ms,
                stuck = reason,
                "shutdown grace exceeded"
            ),
            EventKind::SubscriberPanicked => {
                warn!(target: "depvisor", subscriber = manifold, reason, "subscriber panicked")
            }
            EventKind::SubscriberOverflow => {
                debug!(target: "depvisor", subscriber = manifold, reason, "subscriber overflow")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
