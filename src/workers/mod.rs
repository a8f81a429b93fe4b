//! # Worker contract and ready-made workers.
//!
//! - [`Worker`] - the stop/wait capability every managed task implements
//! - [`WorkerRef`] - shared handle (`Arc<dyn Worker>`) returned by start routines
//! - [`TaskWorker`] - closure-backed worker with its own restart/backoff loop
//! - [`ValueWorker`] - holds a value for dependents to read

mod task_worker;
mod value;
mod worker;

pub use task_worker::{TaskParams, TaskWorker};
pub use value::ValueWorker;
pub use worker::{Worker, WorkerRef, downcast_worker};
