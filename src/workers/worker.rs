//! # Worker supervision contract.
//!
//! A [`Worker`] is a running instance of a task. The engine only ever calls
//! [`Worker::kill`] and [`Worker::wait`] on it, plus the manifold's output
//! projection. Everything else about the task is private to its author.
//!
//! `Any` is a supertrait so output projections can recover the concrete type
//! with [`downcast_worker`].

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::WorkerError;

/// Shared handle to a running worker.
pub type WorkerRef = Arc<dyn Worker>;

/// # Long-lived task managed by the engine.
///
/// ### Contract
/// - `kill` is idempotent and safe to call after the worker already stopped.
/// - `wait` resolves once the worker has fully unwound; it should resolve
///   promptly after `kill`.
/// - After `wait` resolves the worker must not mutate state visible to output
///   projections.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use depvisor::{Worker, WorkerError};
/// use tokio_util::sync::CancellationToken;
///
/// struct Idle(CancellationToken);
///
/// #[async_trait]
/// impl Worker for Idle {
///     fn kill(&self) {
///         self.0.cancel();
///     }
///
///     async fn wait(&self) -> Result<(), WorkerError> {
///         self.0.cancelled().await;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Worker: Any + Send + Sync {
    /// Requests the worker to stop.
    fn kill(&self);

    /// Waits for the worker to stop and returns its terminal result.
    async fn wait(&self) -> Result<(), WorkerError>;
}

/// Recovers the concrete worker type behind a `dyn Worker`.
pub fn downcast_worker<W: Worker>(worker: &dyn Worker) -> Option<&W> {
    let any: &dyn Any = worker;
    any.downcast_ref::<W>()
}
