//! Builder for [`Engine`] with optional subscribers.

use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::config::EngineConfig;
use super::engine::Engine;
use super::event_loop::EventLoop;
use crate::events::{Bus, Event};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for constructing an [`Engine`] with optional features.
pub struct EngineBuilder {
    cfg: EngineConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl EngineBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive engine events (installs, starts, failures, shutdown)
    /// through dedicated workers with bounded queues. They see every event up
    /// to the end of shutdown before [`Engine::wait`] returns.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Spawns the control loop and returns its handle.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Engine {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let (requests_tx, requests_rx) = mpsc::channel(self.cfg.queue_depth_clamped());
        let (done_tx, done_rx) = watch::channel(None);
        let kill = CancellationToken::new();

        let fan_out = if self.subscribers.is_empty() {
            None
        } else {
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            let stop = CancellationToken::new();
            let handle = tokio::spawn(subscriber_listener(bus.subscribe(), set, stop.clone()));
            Some((stop, handle))
        };

        let event_loop = EventLoop::new(self.cfg, bus.clone(), requests_rx, kill.clone());
        tokio::spawn(async move {
            let result = event_loop.run().await;
            if let Some((stop, handle)) = fan_out {
                stop.cancel();
                let _ = handle.await;
            }
            let _ = done_tx.send(Some(result));
        });

        Engine::from_parts(requests_tx, kill, done_rx, bus)
    }
}

/// Forwards bus events to the subscriber set until `stop`, then delivers
/// whatever is still buffered and drains the subscriber queues.
async fn subscriber_listener(
    mut rx: broadcast::Receiver<Event>,
    set: SubscriberSet,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            msg = rx.recv() => match msg {
                Ok(ev) => set.emit(&ev),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            _ = stop.cancelled() => {
                loop {
                    match rx.try_recv() {
                        Ok(ev) => set.emit(&ev),
                        Err(TryRecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    }
                }
                break;
            }
        }
    }
    set.shutdown().await;
}
