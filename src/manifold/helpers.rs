//! Manifold shapes that show up over and over in agents.

use std::any::Any;
use std::future::Future;

use crate::error::WorkerError;
use crate::manifold::Manifold;
use crate::workers::WorkerRef;

/// Builds a manifold with exactly one input whose output is handed to `new_worker`.
///
/// Fails with [`WorkerError::Missing`] while the input is unavailable, so the
/// engine waits for it to (re)start instead of recording a failure. The
/// constructor may itself return `Missing` when the input is present but not
/// useful to this worker.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use depvisor::{ValueWorker, WorkerRef, single_input};
///
/// let m = single_input("agent", |tag: String| async move {
///     Ok(Arc::new(ValueWorker::new(tag)) as WorkerRef)
/// });
/// assert_eq!(m.inputs(), ["agent"]);
/// ```
pub fn single_input<T, F, Fut>(input: &str, new_worker: F) -> Manifold
where
    T: Any + Send,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<WorkerRef, WorkerError>> + Send + 'static,
{
    let name = input.to_string();
    Manifold::new([input], move |res| {
        let value = res.get::<T>(&name);
        let started = value.map(&new_worker);
        async move {
            match started {
                Ok(fut) => fut.await,
                Err(e) => Err(e.into()),
            }
        }
    })
}
