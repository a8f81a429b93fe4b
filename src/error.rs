//! Error types used by the depvisor engine, manifolds and workers.
//!
//! This module defines three error enums:
//!
//! - [`EngineError`]: errors raised by the engine itself (API misuse, cycles,
//!   critical failures, shutdown problems).
//! - [`WorkerError`]: terminal results of a worker or its start routine,
//!   including the `Missing`/`Bounce`/`Uninstall` sentinels the engine reacts to.
//! - [`ResourceError`]: failures of [`Resources::get`](crate::Resources::get).
//!
//! All types provide `as_label` for logging.

use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the engine.
///
/// Returned from the engine API (`install`, `uninstall`, `report`) and as the
/// terminal result of [`Engine::wait`](crate::Engine::wait).
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// No manifold with this name is installed.
    #[error("manifold {name:?} not found")]
    NotFound {
        /// The requested manifold name.
        name: String,
    },

    /// Replacing the manifold would strand dependents that read its output.
    #[error("cannot replace {name:?}: dependents {dependents:?} rely on its output")]
    AlreadyRunningConflict {
        /// The manifold being replaced.
        name: String,
        /// Installed manifolds that list it as an input.
        dependents: Vec<String>,
    },

    /// The manifold's inputs would close a dependency cycle.
    #[error("manifold {name:?} would create a dependency cycle: {}", path.join(" -> "))]
    Cycle {
        /// The manifold being installed.
        name: String,
        /// The cycle, starting and ending at `name`.
        path: Vec<String>,
    },

    /// The engine is shutting down or has stopped.
    #[error("engine is shutting down")]
    Dying,

    /// A critical manifold failed and took the engine down with it.
    #[error("critical manifold {name:?} failed: {source}")]
    Worker {
        /// The critical manifold.
        name: String,
        /// The error it failed with.
        #[source]
        source: WorkerError,
    },

    /// A start routine or worker panicked under [`PanicPolicy::Propagate`](crate::PanicPolicy::Propagate).
    #[error("manifold {name:?} panicked: {info}")]
    Panicked {
        /// The manifold whose code panicked.
        name: String,
        /// Panic payload rendered as text.
        info: String,
    },

    /// Shutdown grace period was exceeded; some workers ignored their stop request.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Manifolds whose workers did not stop in time.
        stuck: Vec<String>,
    },
}

impl EngineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use depvisor::EngineError;
    ///
    /// let err = EngineError::NotFound { name: "api-caller".into() };
    /// assert_eq!(err.as_label(), "engine_not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::NotFound { .. } => "engine_not_found",
            EngineError::AlreadyRunningConflict { .. } => "engine_running_conflict",
            EngineError::Cycle { .. } => "engine_cycle",
            EngineError::Dying => "engine_dying",
            EngineError::Worker { .. } => "engine_worker_fatal",
            EngineError::Panicked { .. } => "engine_panicked",
            EngineError::GraceExceeded { .. } => "engine_grace_exceeded",
        }
    }
}

/// # Terminal results of workers and start routines.
///
/// The first three variants are sentinels interpreted by the engine:
/// - [`WorkerError::Missing`]: a dependency is not available; the manifold waits
///   for one of its inputs to change before it is tried again.
/// - [`WorkerError::Bounce`]: the worker wants to be restarted straight away.
/// - [`WorkerError::Uninstall`]: the manifold should be removed from the engine.
///
/// Everything else is an ordinary failure, recorded against the manifold.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// A required dependency is not currently available.
    #[error("dependency not available")]
    Missing,

    /// The worker asks to be restarted.
    #[error("restart immediately")]
    Bounce,

    /// The worker asks for its manifold to be uninstalled.
    #[error("resource permanently unavailable")]
    Uninstall,

    /// The worker stopped because it was asked to.
    #[error("context cancelled")]
    Canceled,

    /// Ordinary failure.
    #[error("{error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Start routine or worker body panicked.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl WorkerError {
    /// Builds a [`WorkerError::Fail`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use depvisor::WorkerError;
    ///
    /// let err = WorkerError::fail("connection refused");
    /// assert_eq!(err.to_string(), "connection refused");
    /// ```
    pub fn fail(error: impl std::fmt::Display) -> Self {
        WorkerError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Missing => "worker_missing",
            WorkerError::Bounce => "worker_bounce",
            WorkerError::Uninstall => "worker_uninstall",
            WorkerError::Canceled => "worker_canceled",
            WorkerError::Fail { .. } => "worker_failed",
            WorkerError::Panicked { .. } => "worker_panicked",
        }
    }

    /// True for the sentinels the engine handles without recording a failure.
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self,
            WorkerError::Missing | WorkerError::Bounce | WorkerError::Uninstall
        )
    }
}

/// # Failures of resource lookups made through [`Resources`](crate::Resources).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The named manifold is not running (or was restarted since the lookup began).
    #[error("{name:?} not running")]
    Missing {
        /// The requested input.
        name: String,
    },

    /// The named manifold is not one of the declared inputs.
    #[error("{name:?} is not a declared input")]
    Undeclared {
        /// The requested input.
        name: String,
    },

    /// The named manifold does not expose an output.
    #[error("{name:?} has no output")]
    NoOutput {
        /// The requested input.
        name: String,
    },

    /// The output projection cannot produce the requested type.
    #[error("{name:?} cannot output {expected}: offered {offered}")]
    TypeMismatch {
        /// The requested input.
        name: String,
        /// Type asked for by the caller.
        expected: &'static str,
        /// Type the projection tried to write.
        offered: &'static str,
    },

    /// The accessor outlived the start routine it was given to.
    #[error("resource accessor used after start returned")]
    Expired,
}

impl ResourceError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ResourceError::Missing { .. } => "resource_missing",
            ResourceError::Undeclared { .. } => "resource_undeclared",
            ResourceError::NoOutput { .. } => "resource_no_output",
            ResourceError::TypeMismatch { .. } => "resource_type_mismatch",
            ResourceError::Expired => "resource_expired",
        }
    }
}

impl From<ResourceError> for WorkerError {
    /// `Missing` maps onto the engine sentinel; every other lookup failure is a
    /// programming error and becomes an ordinary failure.
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::Missing { .. } => WorkerError::Missing,
            other => WorkerError::fail(other),
        }
    }
}
