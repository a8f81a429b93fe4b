//! # Restart policies for task workers.
//!
//! [`RestartPolicy`] decides whether a [`TaskWorker`](crate::TaskWorker) runs
//! its body again after an attempt finishes.
//!
//! ```text
//! RestartPolicy::Never                   → one attempt, result goes to the engine
//! RestartPolicy::OnFailure               → failures retried with backoff (default)
//! RestartPolicy::Always { interval }     → repeat forever, pausing `interval` after success
//! ```
//!
//! Engine sentinels (`Missing`, `Bounce`, `Uninstall`) always end the loop so
//! the engine can act on them.

use std::time::Duration;

/// Policy controlling whether a task body is run again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Never restart: the body runs once.
    Never,
    /// Restart only on failure.
    #[default]
    OnFailure,
    /// Always restart, after success or failure.
    ///   - `None` → restart immediately after success
    ///   - `Some(dur)` → wait `dur` before the next cycle
    Always {
        /// Pause between successful cycles.
        interval: Option<Duration>,
    },
}
