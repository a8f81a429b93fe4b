//! Engine events: types and broadcast bus.
//!
//! The control loop publishes one [`Event`] per lifecycle transition
//! (installs, starts, stops, failures, shutdown). Subscribers observe them
//! through [`SubscriberSet`](crate::SubscriberSet); nothing in the engine
//! depends on anyone listening.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
