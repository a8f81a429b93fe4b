//! # depvisor
//!
//! **Depvisor** is a dependency engine for long-running async workers.
//!
//! Each task is described by a [`Manifold`]: the names of the manifolds it
//! depends on, an async start routine, and an optional typed output. The
//! [`Engine`] starts a worker only while every input is running, stops and
//! restarts dependents whenever an input changes, and shuts everything down
//! when a critical manifold fails. It is meant as the core of an agent that
//! runs many cooperating background services.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   install("api-caller", m)   install("uniter", m)   uninstall(..)   report()
//!              │                       │                    │            │
//!              ▼                       ▼                    ▼            ▼
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │  Engine handle ──► request queue (bounded, EngineConfig::queue_depth)     │
//! └─────────────────────────────────────┬─────────────────────────────────────┘
//!                                       ▼
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │  EventLoop (single task, owns all state)                                  │
//! │  - manifold graph, phases, generations                                    │
//! │  - Outputs (published workers, read through Resources)                    │
//! │  - reconcile(): start every satisfied manifold, remove uninstalled ones   │
//! └──────┬──────────────────────┬───────────────────────┬─────────────────────┘
//!        ▼                      ▼                       ▼
//!   start task             worker watch            bounce timer
//!   manifold.start(res)    worker.wait()           sleep(bounce_delay)
//!        │                      │                       │
//!        └──── Started ─────────┴──── Stopped ──────────┴──► notices ──► EventLoop
//!
//!   EventLoop ── publish(Event) ──► Bus ──► fan-out listener ──► SubscriberSet
//!                                     └──► Engine::subscribe() receivers
//! ```
//!
//! ### Manifold lifecycle
//! ```text
//! Idle ──(all inputs Running)──► Starting ──Ok(worker)──► Running
//!  ▲                                │                       │
//!  │                                └─Err → filter ─────────┤ exit / input changed /
//!  │                                                        │ replaced / uninstalled
//!  └───────────────────── Stopping ◄── kill() ◄─────────────┘
//!
//! filtered error:
//!   Missing    ─► Idle until an input changes
//!   Bounce     ─► Idle, started again after bounce_delay
//!   Uninstall  ─► removed from the graph
//!   Ok/Canceled─► Idle, not restarted until an input changes
//!   other      ─► last_error recorded; critical ─► engine shuts down
//! ```
//!
//! ## Features
//! | Area              | Description                                                         | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------------|---------------------------------------------|
//! | **Engine**        | Install, replace, uninstall manifolds; shutdown and reports.        | [`Engine`], [`EngineBuilder`], [`EngineReport`] |
//! | **Manifolds**     | Declare inputs, start routine, output projection, error filter.     | [`Manifold`], [`Resources`], [`OutputSlot`] |
//! | **Workers**       | Stop/wait contract and ready-made workers.                          | [`Worker`], [`TaskWorker`], [`ValueWorker`] |
//! | **Policies**      | Restart/backoff for task-side retry loops.                          | [`RestartPolicy`], [`BackoffPolicy`]        |
//! | **Subscriber API**| Hook into engine events (logging, metrics, custom subscribers).     | [`Subscribe`]                               |
//! | **Errors**        | Typed errors for the engine, workers and resource lookups.          | [`EngineError`], [`WorkerError`], [`ResourceError`] |
//! | **Configuration** | Centralize engine settings.                                         | [`EngineConfig`]                            |
//! | **Testing**       | Exercise start routines without an engine.                          | [`testing::StubResources`]                  |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], a subscriber that renders events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use depvisor::{
//!     Engine, EngineConfig, Manifold, TaskParams, TaskWorker, ValueWorker, WorkerError,
//!     WorkerRef, single_input,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::new(EngineConfig::default());
//!
//!     // A manifold with no inputs that exposes a value to dependents.
//!     let api = Manifold::new(Vec::<String>::new(), |_res| async {
//!         Ok(Arc::new(ValueWorker::new(String::from("10.0.0.1:17070"))) as WorkerRef)
//!     })
//!     .with_output(ValueWorker::<String>::output);
//!
//!     // A dependent that runs until killed, restarted whenever the address changes.
//!     let logger = single_input("api-caller", |addr: String| async move {
//!         let worker = TaskWorker::spawn("logger", TaskParams::default(), move |ctx: CancellationToken| {
//!             let addr = addr.clone();
//!             async move {
//!                 println!("talking to {addr}");
//!                 ctx.cancelled().await;
//!                 Ok::<(), WorkerError>(())
//!             }
//!         });
//!         Ok(Arc::new(worker) as WorkerRef)
//!     });
//!
//!     engine.install("api-caller", api).await?;
//!     engine.install("logger", logger).await?;
//!
//!     engine.kill();
//!     engine.wait().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod manifold;
mod policies;
mod subscribers;
mod workers;

pub mod testing;

// ---- Public re-exports ----

pub use crate::core::{
    Engine, EngineBuilder, EngineConfig, EngineReport, EngineState, FatalSink, ManifoldReport,
    PanicPolicy, Phase,
};
pub use crate::error::{EngineError, ResourceError, WorkerError};
pub use crate::events::{Bus, Event, EventKind};
pub use crate::manifold::{
    BoxStartFuture, FilterFn, Manifold, OutputFn, OutputSlot, Resources, StartFn, single_input,
};
pub use crate::policies::{BackoffPolicy, JitterPolicy, RestartPolicy};
pub use crate::subscribers::{Subscribe, SubscriberSet};
pub use crate::workers::{TaskParams, TaskWorker, ValueWorker, Worker, WorkerRef, downcast_worker};

// Optional: expose a tracing-backed logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use crate::subscribers::LogWriter;
