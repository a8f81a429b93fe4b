//! # Event subscribers.
//!
//! [`Subscribe`] is the extension point for observing the engine: logging,
//! metrics, alerting. [`SubscriberSet`] feeds each subscriber from its own
//! bounded queue so a slow or panicking subscriber never stalls the control
//! loop or its peers.
//!
//! ```text
//! control loop ── publish(Event) ──► Bus ──► fan-out listener ──► SubscriberSet::emit
//!                                                           ┌─────────┼─────────┐
//!                                                           ▼         ▼         ▼
//!                                                      [queue 1] [queue 2] [queue N]
//!                                                           ▼         ▼         ▼
//!                                                        on_event  on_event  on_event
//! ```
//!
//! With the `logging` feature, [`LogWriter`] renders events through `tracing`.

#[cfg(feature = "logging")]
mod log;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
