//! # Manifold: declarative descriptor of one supervised task.
//!
//! A [`Manifold`] bundles:
//! - the names of the manifolds it depends on (its inputs),
//! - an async start routine that builds a worker from a [`Resources`] accessor,
//! - an optional output projection dependents read through,
//! - an optional error filter applied to start and worker errors,
//! - a `critical` flag: a critical manifold's failure stops the whole engine.
//!
//! Manifolds are plain data: cloning is cheap and installing the same
//! definition twice yields two independent lifetimes.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use depvisor::{Manifold, ValueWorker, WorkerError, WorkerRef};
//!
//! let api = Manifold::new(Vec::<String>::new(), |_res| async {
//!     Ok(Arc::new(ValueWorker::new(String::from("10.0.0.1:17070"))) as WorkerRef)
//! })
//! .with_output(ValueWorker::<String>::output)
//! .critical();
//!
//! let updater = Manifold::new(["api-caller"], |res| async move {
//!     let addr: String = res.get("api-caller")?;
//!     Ok(Arc::new(ValueWorker::new(addr.len())) as WorkerRef)
//! })
//! .with_filter(|err| match err {
//!     WorkerError::Fail { .. } => WorkerError::Missing,
//!     other => other,
//! });
//!
//! assert!(api.is_critical());
//! assert_eq!(updater.inputs(), ["api-caller"]);
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{ResourceError, WorkerError};
use crate::manifold::resources::{OutputFn, OutputSlot, Resources};
use crate::workers::{Worker, WorkerRef};

/// Boxed future returned by a start routine.
pub type BoxStartFuture = Pin<Box<dyn Future<Output = Result<WorkerRef, WorkerError>> + Send>>;

/// Start routine: builds a worker from the current inputs.
pub type StartFn = Arc<dyn Fn(Resources) -> BoxStartFuture + Send + Sync>;

/// Error filter: reclassifies start and worker errors.
pub type FilterFn = Arc<dyn Fn(WorkerError) -> WorkerError + Send + Sync>;

/// Declarative descriptor of one supervised task.
#[derive(Clone)]
pub struct Manifold {
    inputs: Vec<String>,
    start: StartFn,
    output: Option<OutputFn>,
    filter: Option<FilterFn>,
    critical: bool,
}

impl Manifold {
    /// Creates a manifold with the given inputs and start routine.
    ///
    /// Inputs form an ordered set: duplicates are dropped, first occurrence wins.
    pub fn new<I, S, F, Fut>(inputs: I, start: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Resources) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<WorkerRef, WorkerError>> + Send + 'static,
    {
        let mut unique: Vec<String> = Vec::new();
        for input in inputs {
            let input = input.into();
            if !unique.contains(&input) {
                unique.push(input);
            }
        }

        Self {
            inputs: unique,
            start: Arc::new(move |res: Resources| -> BoxStartFuture { Box::pin(start(res)) }),
            output: None,
            filter: None,
            critical: false,
        }
    }

    /// Sets the output projection dependents read through.
    pub fn with_output<F>(mut self, output: F) -> Self
    where
        F: Fn(&dyn Worker, &mut OutputSlot<'_>) -> Result<(), ResourceError>
            + Send
            + Sync
            + 'static,
    {
        self.output = Some(Arc::new(output));
        self
    }

    /// Sets the error filter.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(WorkerError) -> WorkerError + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Marks the manifold load-bearing: its failure terminates the engine.
    pub fn critical(self) -> Self {
        self.with_critical(true)
    }

    /// Sets or clears the load-bearing flag.
    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// Declared inputs, in declaration order.
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// True if dependents can read this manifold's output.
    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// True if the manifold is load-bearing.
    pub fn is_critical(&self) -> bool {
        self.critical
    }

    /// Invokes the start routine directly (handy in tests with stubbed resources).
    pub fn start(&self, res: Resources) -> BoxStartFuture {
        (self.start)(res)
    }

    pub(crate) fn output(&self) -> Option<OutputFn> {
        self.output.clone()
    }

    /// Runs `err` through the filter, if any.
    pub fn filter(&self, err: WorkerError) -> WorkerError {
        match &self.filter {
            Some(f) => f(err),
            None => err,
        }
    }
}

impl fmt::Debug for Manifold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manifold")
            .field("inputs", &self.inputs)
            .field("output", &self.output.is_some())
            .field("filter", &self.filter.is_some())
            .field("critical", &self.critical)
            .finish()
    }
}
