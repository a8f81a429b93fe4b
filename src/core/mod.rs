//! Runtime core: the engine handle, its control loop and lifecycle.
//!
//! The public API from this module is [`Engine`] (plus its builder, config and
//! report types). Internal modules:
//! - [`event_loop`]: the single task that owns all manifold state;
//! - [`graph`]: cycle detection and dependent lookups;
//! - [`shutdown`]: cross-platform shutdown signal handling.

use std::any::Any;

mod builder;
mod config;
mod engine;
mod event_loop;
mod graph;
mod report;
mod shutdown;

#[cfg(test)]
mod tests;

pub use builder::EngineBuilder;
pub use config::{EngineConfig, FatalSink, PanicPolicy};
pub use engine::Engine;
pub use report::{EngineReport, EngineState, ManifoldReport, Phase};

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
