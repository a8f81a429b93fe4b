//! # Engine configuration.
//!
//! Provides [`EngineConfig`], the settings for one engine instance, passed to
//! [`Engine::new`](crate::Engine::new) or [`Engine::builder`](crate::Engine::builder).
//!
//! ## Sentinel values
//! - `grace = 0s` → do not wait for workers at shutdown; report any still alive as stuck
//! - `bounce_delay = 0s` → re-attempt a bounced manifold on the next loop tick
//! - `queue_depth`, `bus_capacity` are clamped to a minimum of 1

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::EngineError;

/// Callback invoked once with the error that brings the engine down.
pub type FatalSink = Arc<dyn Fn(&EngineError) + Send + Sync>;

/// What to do when a start routine or worker panics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PanicPolicy {
    /// Convert the panic into [`WorkerError::Panicked`](crate::WorkerError::Panicked),
    /// handled like any other failure of that manifold.
    #[default]
    Recover,
    /// Treat the panic as fatal: the engine shuts down and
    /// [`Engine::wait`](crate::Engine::wait) returns [`EngineError::Panicked`].
    Propagate,
}

/// Configuration for one engine instance.
///
/// ## Field semantics
/// - `queue_depth`: capacity of the install/uninstall/report request queue
/// - `bus_capacity`: event bus ring buffer size
/// - `grace`: bounded wait for workers at shutdown
/// - `bounce_delay`: pause before a bounced manifold is started again
/// - `panic_policy`: recover or propagate panics in start routines and workers
/// - `on_fatal`: optional sink for the engine's terminal fatal error
#[derive(Clone)]
pub struct EngineConfig {
    /// Capacity of the request queue. Callers of `install`/`uninstall` wait
    /// for room when it is full.
    pub queue_depth: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Receivers lagging more than `bus_capacity` events skip the oldest ones.
    pub bus_capacity: usize,

    /// Maximum time to wait for workers to stop once shutdown starts.
    ///
    /// If exceeded, [`Engine::wait`](crate::Engine::wait) returns
    /// [`EngineError::GraceExceeded`] naming the stuck manifolds (unless a
    /// fatal error is already being reported).
    pub grace: Duration,

    /// Delay before a manifold that returned `Bounce` is started again.
    pub bounce_delay: Duration,

    /// How panics in start routines and workers are handled.
    pub panic_policy: PanicPolicy,

    /// Called once with the fatal error when a critical manifold fails or a
    /// panic is propagated.
    pub on_fatal: Option<FatalSink>,
}

impl EngineConfig {
    /// Request queue depth clamped to a minimum of 1.
    #[inline]
    pub fn queue_depth_clamped(&self) -> usize {
        self.queue_depth.max(1)
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Sets the fatal error sink.
    pub fn with_fatal_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&EngineError) + Send + Sync + 'static,
    {
        self.on_fatal = Some(Arc::new(sink));
        self
    }
}

impl Default for EngineConfig {
    /// Default configuration:
    ///
    /// - `queue_depth = 64`
    /// - `bus_capacity = 1024`
    /// - `grace = 30s`
    /// - `bounce_delay = 10ms`
    /// - `panic_policy = PanicPolicy::Recover`
    /// - `on_fatal = None`
    fn default() -> Self {
        Self {
            queue_depth: 64,
            bus_capacity: 1024,
            grace: Duration::from_secs(30),
            bounce_delay: Duration::from_millis(10),
            panic_policy: PanicPolicy::default(),
            on_fatal: None,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("queue_depth", &self.queue_depth)
            .field("bus_capacity", &self.bus_capacity)
            .field("grace", &self.grace)
            .field("bounce_delay", &self.bounce_delay)
            .field("panic_policy", &self.panic_policy)
            .field("on_fatal", &self.on_fatal.is_some())
            .finish()
    }
}
