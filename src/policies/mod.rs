//! Retry policies for task-side restart loops.
//!
//! The engine itself never retries a failed manifold; these knobs drive the
//! retry loop inside [`TaskWorker`](crate::TaskWorker).
//!
//! ## Contents
//! - [`RestartPolicy`] when to run the task body again (never / on-failure / always)
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid synchronized retries
//!
//! ## Quick wiring
//! ```text
//! TaskParams { restart, backoff, timeout }
//!      └─► TaskWorker attempt loop:
//!           - restart decides continue/exit
//!           - backoff.next(failures) schedules the next attempt
//! ```
//!
//! ## Defaults
//! - `RestartPolicy::OnFailure`.
//! - `BackoffPolicy::default()` → first=100ms, factor=1.0 (constant), max=30s, jitter=None.
//! - `JitterPolicy::None`.

mod backoff;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::RestartPolicy;
