//! # Engine handle.
//!
//! [`Engine`] is a cheap, cloneable handle to a running control loop. Every
//! call is a message to the loop; the loop owns all manifold state.
//!
//! ## Lifecycle
//! ```text
//! Engine::new(cfg) ──► install(..)/uninstall(..)/report() ──► kill() ──► wait()
//!                               │                                          ▲
//!                               └── critical failure ──────────────────────┘
//! ```
//!
//! ## Rules
//! - `kill()` is idempotent and never blocks.
//! - `wait()` resolves with the same result for every caller and every clone.
//! - After shutdown begins, `install`/`uninstall`/`report` fail with
//!   [`EngineError::Dying`].
//! - Dropping every handle shuts the engine down.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use depvisor::{Engine, EngineConfig, Manifold, ValueWorker, WorkerRef};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), depvisor::EngineError> {
//! let engine = Engine::new(EngineConfig::default());
//!
//! let agent = Manifold::new(Vec::<String>::new(), |_res| async {
//!     Ok(Arc::new(ValueWorker::new(String::from("machine-0"))) as WorkerRef)
//! })
//! .with_output(ValueWorker::<String>::output);
//! engine.install("agent", agent).await?;
//!
//! engine.kill();
//! engine.wait().await
//! # }
//! ```

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use super::builder::EngineBuilder;
use super::config::EngineConfig;
use super::event_loop::Request;
use super::report::EngineReport;
use super::shutdown;
use crate::error::EngineError;
use crate::events::{Bus, Event, EventKind};
use crate::manifold::Manifold;

/// Handle to a running dependency engine.
#[derive(Clone)]
pub struct Engine {
    requests: mpsc::Sender<Request>,
    kill: CancellationToken,
    done: watch::Receiver<Option<Result<(), EngineError>>>,
    bus: Bus,
}

impl Engine {
    /// Spawns an engine with no subscribers.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(cfg: EngineConfig) -> Self {
        EngineBuilder::new(cfg).build()
    }

    /// Returns a builder for an engine with subscribers.
    pub fn builder(cfg: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(cfg)
    }

    pub(crate) fn from_parts(
        requests: mpsc::Sender<Request>,
        kill: CancellationToken,
        done: watch::Receiver<Option<Result<(), EngineError>>>,
        bus: Bus,
    ) -> Self {
        Self {
            requests,
            kill,
            done,
            bus,
        }
    }

    /// Installs (or replaces) manifold `name`.
    ///
    /// Returns once the graph is updated; the worker starts as soon as every
    /// input is running. Replacing a manifold stops its worker and every
    /// running dependent first.
    ///
    /// # Errors
    /// - [`EngineError::Cycle`] if the inputs would close a dependency cycle
    /// - [`EngineError::AlreadyRunningConflict`] if dependents read the
    ///   current definition's output and the new one has none
    /// - [`EngineError::Dying`] once shutdown has begun
    pub async fn install(
        &self,
        name: impl Into<String>,
        manifold: Manifold,
    ) -> Result<(), EngineError> {
        let name = name.into();
        self.call(|reply| Request::Install {
            name,
            manifold,
            reply,
        })
        .await?
    }

    /// Removes manifold `name` once its worker has stopped.
    ///
    /// Running dependents are stopped and wait for the input to come back.
    ///
    /// # Errors
    /// - [`EngineError::NotFound`] if nothing is installed under `name`
    /// - [`EngineError::Dying`] once shutdown has begun
    pub async fn uninstall(&self, name: &str) -> Result<(), EngineError> {
        let name = name.to_string();
        self.call(|reply| Request::Uninstall { name, reply }).await?
    }

    /// Returns a snapshot of every installed manifold.
    pub async fn report(&self) -> Result<EngineReport, EngineError> {
        self.call(|reply| Request::Report { reply }).await
    }

    /// Requests shutdown. Idempotent; returns immediately.
    pub fn kill(&self) {
        self.kill.cancel();
    }

    /// Kills the engine and waits for it to stop.
    pub async fn stop(&self) -> Result<(), EngineError> {
        self.kill();
        self.wait().await
    }

    /// Waits for the engine to stop.
    ///
    /// Returns `Ok(())` after [`kill`](Self::kill) when every worker stopped
    /// within the grace period, the fatal error if a critical manifold failed,
    /// or [`EngineError::GraceExceeded`].
    pub async fn wait(&self) -> Result<(), EngineError> {
        let mut done = self.done.clone();
        let result = match done.wait_for(Option::is_some).await {
            Ok(result) => result.clone(),
            // Control loop task dropped without reporting.
            Err(_) => return Err(EngineError::Dying),
        };
        result.unwrap_or(Ok(()))
    }

    /// Waits for the engine to stop, killing it on SIGINT/SIGTERM/SIGQUIT
    /// (Ctrl-C on Windows).
    pub async fn wait_or_signal(&self) -> Result<(), EngineError> {
        tokio::select! {
            res = self.wait() => res,
            sig = shutdown::wait_for_shutdown_signal() => {
                if sig.is_ok() {
                    self.bus.publish(
                        Event::new(EventKind::ShutdownRequested).with_reason("os signal"),
                    );
                    self.kill();
                }
                self.wait().await
            }
        }
    }

    /// Returns a receiver of engine events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// True once shutdown was requested through [`kill`](Self::kill).
    pub fn is_killed(&self) -> bool {
        self.kill.is_cancelled()
    }

    async fn call<T>(
        &self,
        request: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T, EngineError> {
        if self.kill.is_cancelled() {
            return Err(EngineError::Dying);
        }
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(request(tx))
            .await
            .map_err(|_| EngineError::Dying)?;
        rx.await.map_err(|_| EngineError::Dying)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("killed", &self.is_killed())
            .field("done", &self.done.borrow().is_some())
            .finish()
    }
}
