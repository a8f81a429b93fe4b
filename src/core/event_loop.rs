//! # Engine control loop.
//!
//! A single task owns every piece of manifold state. Callers talk to it through
//! a bounded request queue; start routines and worker watchers report back
//! through an unbounded notice channel. Nothing else mutates the graph.
//!
//! ## Architecture
//! ```text
//! Engine::install/uninstall/report ──► [requests] ──┐
//!                                                   │
//! start tasks    ── Started{attempt}  ──┐           ▼
//! worker watches ── Stopped{generation} ├─► [notices] ──► EventLoop ──► reconcile()
//! bounce timers  ── BounceElapsed      ──┘                   │
//!                                                            ├──► Outputs (publish/unpublish)
//!                                                            └──► Bus (events)
//! ```
//!
//! ## Rules
//! - A manifold starts only while every input is `Running`.
//! - Publishing a worker bumps its generation and stops every running
//!   transitive dependent; idle direct dependents are retried.
//! - A worker leaving `Running` is unpublished before it is killed.
//! - A dependent restarts only after its old worker's `wait` returned.
//! - Start results and worker exits are matched by attempt and generation;
//!   stale ones are ignored.
//! - The engine never retries an ordinary failure on its own.

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use super::config::{EngineConfig, PanicPolicy};
use super::graph;
use super::panic_message;
use super::report::{EngineReport, EngineState, ManifoldReport, Phase};
use crate::error::{EngineError, WorkerError};
use crate::events::{Bus, Event, EventKind};
use crate::manifold::{Manifold, Outputs, Published, Resources};
use crate::workers::WorkerRef;

/// Caller request with its reply channel.
pub(crate) enum Request {
    Install {
        name: String,
        manifold: Manifold,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Uninstall {
        name: String,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Report {
        reply: oneshot::Sender<EngineReport>,
    },
}

/// Completion reported by tasks the loop spawned.
enum Notice {
    Started {
        name: String,
        attempt: u64,
        result: Result<WorkerRef, WorkerError>,
    },
    Stopped {
        name: String,
        generation: u64,
        result: Result<(), WorkerError>,
    },
    BounceElapsed {
        name: String,
        attempt: u64,
    },
}

/// Per-manifold bookkeeping.
struct Slot {
    manifold: Manifold,
    phase: Phase,
    worker: Option<WorkerRef>,
    generation: u64,
    attempt: u64,
    abort: Option<CancellationToken>,
    /// Start as soon as every input is running.
    wanted: bool,
    uninstalling: bool,
    start_count: u64,
    last_error: Option<WorkerError>,
}

impl Slot {
    fn new(manifold: Manifold) -> Self {
        Self {
            manifold,
            phase: Phase::Idle,
            worker: None,
            generation: 0,
            attempt: 0,
            abort: None,
            wanted: true,
            uninstalling: false,
            start_count: 0,
            last_error: None,
        }
    }
}

pub(crate) struct EventLoop {
    cfg: EngineConfig,
    bus: Bus,
    outputs: Outputs,
    slots: BTreeMap<String, Slot>,
    requests: mpsc::Receiver<Request>,
    notices_tx: mpsc::UnboundedSender<Notice>,
    notices: mpsc::UnboundedReceiver<Notice>,
    kill: CancellationToken,
    /// Engine-wide counter for attempts and generations.
    counter: u64,
    dying: bool,
    fatal: Option<EngineError>,
}

impl EventLoop {
    pub(crate) fn new(
        cfg: EngineConfig,
        bus: Bus,
        requests: mpsc::Receiver<Request>,
        kill: CancellationToken,
    ) -> Self {
        let (notices_tx, notices) = mpsc::unbounded_channel();
        Self {
            cfg,
            bus,
            outputs: Outputs::default(),
            slots: BTreeMap::new(),
            requests,
            notices_tx,
            notices,
            kill,
            counter: 0,
            dying: false,
            fatal: None,
        }
    }

    /// Runs until killed, fatally failed, or every engine handle is dropped.
    pub(crate) async fn run(mut self) -> Result<(), EngineError> {
        while !self.dying {
            select! {
                biased;
                _ = self.kill.cancelled() => self.begin_shutdown(None),
                Some(notice) = self.notices.recv() => self.on_notice(notice),
                req = self.requests.recv() => match req {
                    Some(req) => self.on_request(req),
                    None => self.begin_shutdown(None),
                },
            }
            self.reconcile();
        }
        self.finish().await
    }

    fn on_request(&mut self, req: Request) {
        match req {
            Request::Install {
                name,
                manifold,
                reply,
            } => {
                let _ = reply.send(self.install(name, manifold));
            }
            Request::Uninstall { name, reply } => {
                let _ = reply.send(self.uninstall(&name));
            }
            Request::Report { reply } => {
                let _ = reply.send(self.report());
            }
        }
    }

    fn on_notice(&mut self, notice: Notice) {
        match notice {
            Notice::Started {
                name,
                attempt,
                result,
            } => self.on_started(&name, attempt, result),
            Notice::Stopped {
                name,
                generation,
                result,
            } => self.on_stopped(&name, generation, result),
            Notice::BounceElapsed { name, attempt } => {
                if let Some(slot) = self.slots.get_mut(&name) {
                    if slot.attempt == attempt && slot.phase == Phase::Idle && !slot.uninstalling {
                        slot.wanted = true;
                    }
                }
            }
        }
    }

    fn install(&mut self, name: String, manifold: Manifold) -> Result<(), EngineError> {
        let slots = &self.slots;
        if let Some(path) = graph::find_cycle(&name, manifold.inputs(), |n| {
            slots.get(n).map(|s| s.manifold.inputs())
        }) {
            return Err(EngineError::Cycle { name, path });
        }

        let Some(current) = self.slots.get(&name) else {
            self.slots.insert(name.clone(), Slot::new(manifold));
            self.bus
                .publish(Event::new(EventKind::ManifoldInstalled).with_manifold(name.as_str()));
            return Ok(());
        };

        if current.manifold.has_output() && !manifold.has_output() {
            let dependents = self.direct_dependents(&name);
            if !dependents.is_empty() {
                return Err(EngineError::AlreadyRunningConflict { name, dependents });
            }
        }

        if let Some(slot) = self.slots.get_mut(&name) {
            slot.manifold = manifold;
            slot.wanted = true;
            slot.uninstalling = false;
            slot.last_error = None;
        }
        self.bus
            .publish(Event::new(EventKind::ManifoldReplaced).with_manifold(name.as_str()));
        self.stop(&name);
        Ok(())
    }

    fn uninstall(&mut self, name: &str) -> Result<(), EngineError> {
        let slot = self
            .slots
            .get_mut(name)
            .ok_or_else(|| EngineError::NotFound {
                name: name.to_string(),
            })?;
        slot.uninstalling = true;
        slot.wanted = false;
        self.stop(name);
        Ok(())
    }

    fn report(&self) -> EngineReport {
        let manifolds = self
            .slots
            .iter()
            .map(|(name, slot)| {
                let inputs = slot.manifold.inputs().to_vec();
                let missing = inputs
                    .iter()
                    .filter(|i| !self.is_running(i))
                    .cloned()
                    .collect();
                let report = ManifoldReport {
                    phase: slot.phase,
                    inputs,
                    missing,
                    generation: slot.generation,
                    start_count: slot.start_count,
                    critical: slot.manifold.is_critical(),
                    uninstalling: slot.uninstalling,
                    last_error: slot.last_error.clone(),
                };
                (name.clone(), report)
            })
            .collect();

        EngineReport {
            state: if self.dying {
                EngineState::Stopping
            } else {
                EngineState::Running
            },
            manifolds,
        }
    }

    /// Starts every wanted manifold whose inputs are running and removes
    /// idle manifolds marked for uninstall, until nothing changes.
    fn reconcile(&mut self) {
        if self.dying {
            return;
        }
        loop {
            let removable: Vec<String> = self
                .slots
                .iter()
                .filter(|(_, s)| s.uninstalling && s.phase == Phase::Idle)
                .map(|(name, _)| name.clone())
                .collect();
            for name in &removable {
                self.slots.remove(name);
                self.bus
                    .publish(Event::new(EventKind::ManifoldUninstalled).with_manifold(name.as_str()));
            }

            let ready: Vec<String> = self
                .slots
                .iter()
                .filter(|(_, s)| s.wanted && !s.uninstalling && s.phase == Phase::Idle)
                .filter(|(_, s)| s.manifold.inputs().iter().all(|i| self.is_running(i)))
                .map(|(name, _)| name.clone())
                .collect();
            if removable.is_empty() && ready.is_empty() {
                break;
            }
            for name in &ready {
                self.start(name);
            }
        }
    }

    fn start(&mut self, name: &str) {
        self.counter += 1;
        let attempt = self.counter;
        let Some(slot) = self.slots.get(name) else {
            return;
        };
        let seen: HashMap<String, u64> = slot
            .manifold
            .inputs()
            .iter()
            .filter_map(|i| self.slots.get(i).map(|s| (i.clone(), s.generation)))
            .collect();

        let abort = CancellationToken::new();
        let res = Resources::bound(name, self.outputs.clone(), seen, abort.clone());
        let Some(slot) = self.slots.get_mut(name) else {
            return;
        };
        slot.phase = Phase::Starting;
        slot.attempt = attempt;
        slot.abort = Some(abort);
        slot.wanted = false;
        let manifold = slot.manifold.clone();

        self.bus
            .publish(Event::new(EventKind::ManifoldStarting).with_manifold(name));

        let tx = self.notices_tx.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            let result = match std::panic::catch_unwind(AssertUnwindSafe(|| manifold.start(res.clone()))) {
                Ok(fut) => AssertUnwindSafe(fut)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(panicked(payload.as_ref()))),
                Err(payload) => Err(panicked(payload.as_ref())),
            };
            res.expire();
            let _ = tx.send(Notice::Started {
                name,
                attempt,
                result,
            });
        });
    }

    fn on_started(&mut self, name: &str, attempt: u64, result: Result<WorkerRef, WorkerError>) {
        let Some(slot) = self
            .slots
            .get_mut(name)
            .filter(|s| s.phase == Phase::Starting && s.attempt == attempt)
        else {
            if let Ok(worker) = result {
                worker.kill();
            }
            return;
        };
        let aborted = slot.abort.take().is_some_and(|t| t.is_cancelled());

        let worker = match result {
            Ok(worker) => worker,
            Err(err) => {
                slot.phase = Phase::Idle;
                if !aborted {
                    let err = slot.manifold.filter(err);
                    self.on_failure(name, None, err);
                }
                return;
            }
        };

        self.counter += 1;
        let generation = self.counter;
        slot.generation = generation;
        slot.worker = Some(worker.clone());
        watch_worker(
            self.notices_tx.clone(),
            self.outputs.clone(),
            name,
            generation,
            worker.clone(),
        );

        if aborted {
            slot.phase = Phase::Stopping;
            worker.kill();
            return;
        }

        slot.phase = Phase::Running;
        slot.start_count += 1;
        slot.last_error = None;
        self.outputs.publish(
            name,
            Published {
                worker,
                output: slot.manifold.output(),
                generation,
            },
        );
        self.bus.publish(
            Event::new(EventKind::ManifoldStarted)
                .with_manifold(name)
                .with_generation(generation),
        );
        self.input_changed(name);
    }

    fn on_stopped(&mut self, name: &str, generation: u64, result: Result<(), WorkerError>) {
        let Some(slot) = self
            .slots
            .get_mut(name)
            .filter(|s| s.generation == generation && s.worker.is_some())
        else {
            return;
        };
        let exited = slot.phase == Phase::Running;
        slot.worker = None;
        slot.phase = Phase::Idle;

        if !exited {
            self.bus.publish(
                Event::new(EventKind::WorkerStopped)
                    .with_manifold(name)
                    .with_generation(generation),
            );
            return;
        }

        let result = result.map_err(|e| slot.manifold.filter(e));
        self.outputs.unpublish_if(name, generation);
        self.invalidate_dependents(name);
        match result {
            Ok(()) | Err(WorkerError::Canceled) => {
                slot_mut(&mut self.slots, name, |s| s.wanted = false);
                self.bus.publish(
                    Event::new(EventKind::WorkerStopped)
                        .with_manifold(name)
                        .with_generation(generation),
                );
            }
            Err(err) => self.on_failure(name, Some(generation), err),
        }
    }

    /// Applies a filtered error from a start (`generation == None`) or a
    /// worker that exited on its own.
    fn on_failure(&mut self, name: &str, generation: Option<u64>, err: WorkerError) {
        let propagate = self.cfg.panic_policy == PanicPolicy::Propagate;
        let bounce_delay = self.cfg.bounce_delay;
        let Some(slot) = self.slots.get_mut(name) else {
            return;
        };
        slot.wanted = false;

        let kind = match (&err, generation) {
            (WorkerError::Bounce, _) => EventKind::WorkerBounced,
            (WorkerError::Fail { .. } | WorkerError::Panicked { .. }, None) => EventKind::StartFailed,
            (WorkerError::Fail { .. } | WorkerError::Panicked { .. }, Some(_)) => EventKind::WorkerFailed,
            (_, None) => EventKind::StartFailed,
            (_, Some(_)) => EventKind::WorkerStopped,
        };
        let mut ev = Event::new(kind)
            .with_manifold(name)
            .with_reason(err.to_string());
        if let Some(generation) = generation {
            ev = ev.with_generation(generation);
        }

        let fatal = match err {
            WorkerError::Missing | WorkerError::Canceled => None,
            WorkerError::Uninstall => {
                slot.uninstalling = true;
                None
            }
            WorkerError::Bounce => {
                ev = ev.with_delay(bounce_delay);
                if bounce_delay.is_zero() {
                    slot.wanted = true;
                } else {
                    let tx = self.notices_tx.clone();
                    let name = name.to_string();
                    let attempt = slot.attempt;
                    tokio::spawn(async move {
                        time::sleep(bounce_delay).await;
                        let _ = tx.send(Notice::BounceElapsed { name, attempt });
                    });
                }
                None
            }
            WorkerError::Panicked { info } if propagate => {
                slot.last_error = Some(WorkerError::Panicked { info: info.clone() });
                Some(EngineError::Panicked {
                    name: name.to_string(),
                    info,
                })
            }
            err => {
                slot.last_error = Some(err.clone());
                slot.manifold.is_critical().then(|| EngineError::Worker {
                    name: name.to_string(),
                    source: err,
                })
            }
        };

        self.bus.publish(ev);
        if let Some(err) = fatal {
            self.bus.publish(
                Event::new(EventKind::EngineFatal)
                    .with_manifold(name)
                    .with_reason(err.to_string()),
            );
            self.begin_shutdown(Some(err));
        }
    }

    /// Stops `name` and every running transitive dependent.
    fn stop(&mut self, name: &str) {
        self.halt(name);
        self.invalidate_dependents(name);
    }

    /// Asks one manifold's worker (or in-flight start) to stop.
    ///
    /// Returns true if something was running.
    fn halt(&mut self, name: &str) -> bool {
        let Some(slot) = self.slots.get_mut(name) else {
            return false;
        };
        match slot.phase {
            Phase::Running => {
                self.outputs.unpublish(name);
                slot.phase = Phase::Stopping;
                if let Some(worker) = &slot.worker {
                    worker.kill();
                }
                true
            }
            Phase::Starting => {
                if let Some(abort) = &slot.abort {
                    abort.cancel();
                }
                true
            }
            Phase::Idle | Phase::Stopping => false,
        }
    }

    /// Stops every running transitive dependent of `name` so it restarts
    /// against the new state of its inputs.
    fn invalidate_dependents(&mut self, name: &str) {
        let dependents = graph::transitive_dependents(
            name,
            self.slots
                .iter()
                .map(|(n, s)| (n.as_str(), s.manifold.inputs())),
        );

        let mut stopped = Vec::new();
        for dependent in dependents {
            if self.halt(&dependent) {
                slot_mut(&mut self.slots, &dependent, |s| s.wanted = !s.uninstalling);
                stopped.push(dependent);
            }
        }
        if !stopped.is_empty() {
            self.bus.publish(
                Event::new(EventKind::DependentsInvalidated)
                    .with_manifold(name)
                    .with_reason(stopped.join(", ")),
            );
        }
    }

    /// `name` published a new worker: stop stale dependents, retry idle ones.
    fn input_changed(&mut self, name: &str) {
        self.invalidate_dependents(name);
        for slot in self.slots.values_mut() {
            if slot.phase == Phase::Idle
                && !slot.uninstalling
                && slot.manifold.inputs().iter().any(|i| i == name)
            {
                slot.wanted = true;
            }
        }
    }

    fn begin_shutdown(&mut self, fatal: Option<EngineError>) {
        if let Some(err) = fatal {
            if self.fatal.is_none() {
                if let Some(sink) = &self.cfg.on_fatal {
                    sink(&err);
                }
                self.fatal = Some(err);
            }
        }
        if self.dying {
            return;
        }
        self.dying = true;
        self.bus.publish(Event::new(EventKind::ShutdownRequested));

        let names: Vec<String> = self.slots.keys().cloned().collect();
        for name in &names {
            self.halt(name);
            slot_mut(&mut self.slots, name, |s| s.wanted = false);
        }
    }

    /// Waits up to the grace period for workers and starts to finish.
    async fn finish(mut self) -> Result<(), EngineError> {
        self.requests.close();
        let grace = self.cfg.grace;
        let drained = time::timeout(grace, self.drain()).await.is_ok();

        let stuck = if drained { Vec::new() } else { self.live() };
        if drained {
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
        } else {
            self.bus.publish(
                Event::new(EventKind::GraceExceeded)
                    .with_delay(grace)
                    .with_reason(stuck.join(", ")),
            );
        }

        match self.fatal.take() {
            Some(err) => Err(err),
            None if drained => Ok(()),
            None => Err(EngineError::GraceExceeded { grace, stuck }),
        }
    }

    async fn drain(&mut self) {
        while !self.live().is_empty() {
            match self.notices.recv().await {
                Some(notice) => self.on_notice(notice),
                None => break,
            }
        }
    }

    fn live(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|(_, s)| s.phase != Phase::Idle)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn is_running(&self, name: &str) -> bool {
        self.slots
            .get(name)
            .is_some_and(|s| s.phase == Phase::Running)
    }

    fn direct_dependents(&self, name: &str) -> Vec<String> {
        self.slots
            .iter()
            .filter(|(_, s)| s.manifold.inputs().iter().any(|i| i == name))
            .map(|(n, _)| n.clone())
            .collect()
    }
}

fn slot_mut(slots: &mut BTreeMap<String, Slot>, name: &str, f: impl FnOnce(&mut Slot)) {
    if let Some(slot) = slots.get_mut(name) {
        f(slot);
    }
}

fn panicked(payload: &(dyn std::any::Any + Send)) -> WorkerError {
    WorkerError::Panicked {
        info: panic_message(payload),
    }
}

/// Unpublishes the worker as soon as it exits, then reports the exit to the loop.
fn watch_worker(
    tx: mpsc::UnboundedSender<Notice>,
    outputs: Outputs,
    name: &str,
    generation: u64,
    worker: WorkerRef,
) {
    let name = name.to_string();
    tokio::spawn(async move {
        let result = AssertUnwindSafe(worker.wait())
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(panicked(payload.as_ref())));
        outputs.unpublish_if(&name, generation);
        let _ = tx.send(Notice::Stopped {
            name,
            generation,
            result,
        });
    });
}
