//! Snapshot of engine state returned by [`Engine::report`](crate::Engine::report).

use std::collections::BTreeMap;

use crate::error::WorkerError;

/// Lifecycle phase of one manifold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No worker; waiting for inputs, a dependency change or removal.
    Idle,
    /// Start routine in flight.
    Starting,
    /// Worker running and visible to dependents.
    Running,
    /// Worker asked to stop; waiting for it to finish.
    Stopping,
}

/// Overall engine state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Accepting requests.
    Running,
    /// Shutting down; no more starts.
    Stopping,
}

/// Per-manifold part of an [`EngineReport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifoldReport {
    /// Current phase.
    pub phase: Phase,
    /// Declared inputs, in declaration order.
    pub inputs: Vec<String>,
    /// Declared inputs that are not running right now.
    pub missing: Vec<String>,
    /// Generation of the current (or last) worker; 0 if never started.
    pub generation: u64,
    /// Number of successful starts since install.
    pub start_count: u64,
    /// True if the manifold is load-bearing.
    pub critical: bool,
    /// True if removal is pending.
    pub uninstalling: bool,
    /// Last ordinary failure, cleared by the next successful start.
    pub last_error: Option<WorkerError>,
}

/// Point-in-time view of the whole engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineReport {
    /// Engine state.
    pub state: EngineState,
    /// Installed manifolds by name.
    pub manifolds: BTreeMap<String, ManifoldReport>,
}

impl EngineReport {
    /// Names of manifolds currently in `phase`.
    pub fn in_phase(&self, phase: Phase) -> Vec<&str> {
        self.manifolds
            .iter()
            .filter(|(_, m)| m.phase == phase)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
