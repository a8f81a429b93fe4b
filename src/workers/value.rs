//! # Worker that just holds a value.
//!
//! [`ValueWorker`] does no work: it keeps a value alive until killed, and its
//! [`output`](ValueWorker::output) projection hands clones of the value to
//! dependents. Agents use it to inject configuration or shared clients into
//! the graph.

use std::any::Any;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{ResourceError, WorkerError};
use crate::manifold::OutputSlot;
use crate::workers::worker::{Worker, downcast_worker};

/// Holds a value until killed.
#[derive(Debug)]
pub struct ValueWorker<T> {
    value: T,
    token: CancellationToken,
}

impl<T> ValueWorker<T>
where
    T: Any + Clone + Send + Sync,
{
    /// Wraps `value` in a running worker.
    pub fn new(value: T) -> Self {
        Self {
            value,
            token: CancellationToken::new(),
        }
    }

    /// The held value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Output projection for manifolds whose worker is a `ValueWorker<T>`.
    ///
    /// Dependents must ask for exactly `T`.
    pub fn output(worker: &dyn Worker, slot: &mut OutputSlot<'_>) -> Result<(), ResourceError> {
        match downcast_worker::<Self>(worker) {
            Some(w) => slot.put(w.value.clone()),
            None => Err(ResourceError::TypeMismatch {
                name: slot.name().to_string(),
                expected: slot.expected(),
                offered: "unrecognised worker",
            }),
        }
    }
}

#[async_trait]
impl<T> Worker for ValueWorker<T>
where
    T: Any + Send + Sync,
{
    fn kill(&self) {
        self.token.cancel();
    }

    async fn wait(&self) -> Result<(), WorkerError> {
        self.token.cancelled().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn kill_is_idempotent() {
        let w = ValueWorker::new(5u8);
        w.kill();
        w.kill();
        assert_eq!(w.wait().await, Ok(()));
        assert_eq!(w.wait().await, Ok(()));
    }
}
