use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::error::{EngineError, ResourceError, WorkerError};
use crate::events::{Event, EventKind};
use crate::manifold::{Manifold, Resources};
use crate::subscribers::Subscribe;
use crate::workers::{Worker, WorkerRef, downcast_worker};

/// Worker that runs until killed or told to finish with a result.
struct Probe {
    name: String,
    token: CancellationToken,
    outcome: Mutex<Option<Result<(), WorkerError>>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl Probe {
    fn finish(&self, result: Result<(), WorkerError>) {
        *self.outcome.lock().unwrap() = Some(result);
        self.token.cancel();
    }
}

#[async_trait]
impl Worker for Probe {
    fn kill(&self) {
        self.token.cancel();
    }

    async fn wait(&self) -> Result<(), WorkerError> {
        self.token.cancelled().await;
        self.log.lock().unwrap().push(format!("stopped {}", self.name));
        self.outcome.lock().unwrap().take().unwrap_or(Ok(()))
    }
}

/// Records starts and stops of probe workers.
#[derive(Clone, Default)]
struct Harness {
    log: Arc<Mutex<Vec<String>>>,
    live: Arc<Mutex<HashMap<String, Arc<Probe>>>>,
    starts: Arc<Mutex<HashMap<String, usize>>>,
}

impl Harness {
    /// Manifold whose worker outputs its own name and reads every input as a `String`.
    fn manifold(&self, name: &str, inputs: &[&str]) -> Manifold {
        let h = self.clone();
        let name = name.to_string();
        let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
        let declared = inputs.clone();
        Manifold::new(declared, move |res: Resources| {
            let h = h.clone();
            let name = name.clone();
            let inputs = inputs.clone();
            async move {
                for input in &inputs {
                    let _: String = res.get(input)?;
                }
                Ok(h.spawn_probe(&name) as WorkerRef)
            }
        })
        .with_output(|w, slot| {
            let probe = downcast_worker::<Probe>(w).ok_or(ResourceError::NoOutput {
                name: slot.name().to_string(),
            })?;
            slot.put(probe.name.clone())
        })
    }

    fn spawn_probe(&self, name: &str) -> Arc<Probe> {
        let probe = Arc::new(Probe {
            name: name.to_string(),
            token: CancellationToken::new(),
            outcome: Mutex::new(None),
            log: self.log.clone(),
        });
        self.log.lock().unwrap().push(format!("start {name}"));
        *self.starts.lock().unwrap().entry(name.to_string()).or_default() += 1;
        self.live
            .lock()
            .unwrap()
            .insert(name.to_string(), probe.clone());
        probe
    }

    fn starts(&self, name: &str) -> usize {
        self.starts.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    fn worker(&self, name: &str) -> Arc<Probe> {
        self.live.lock().unwrap()[name].clone()
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn position(&self, entry: &str) -> Option<usize> {
        self.log().iter().position(|e| e == entry)
    }

    fn last_position(&self, entry: &str) -> Option<usize> {
        self.log().iter().rposition(|e| e == entry)
    }
}

async fn eventually(what: &str, cond: impl Fn() -> bool) {
    let ok = timeout(Duration::from_secs(2), async {
        while !cond() {
            sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(ok.is_ok(), "timed out waiting for: {what}");
}

async fn phase_of(engine: &Engine, name: &str) -> Option<Phase> {
    engine
        .report()
        .await
        .ok()
        .and_then(|r| r.manifolds.get(name).map(|m| m.phase))
}

async fn until_phase(engine: &Engine, name: &str, phase: Phase) {
    let ok = timeout(Duration::from_secs(2), async {
        while phase_of(engine, name).await != Some(phase) {
            sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(ok.is_ok(), "{name} never reached {phase:?}");
}

async fn until_gone(engine: &Engine, name: &str) {
    let ok = timeout(Duration::from_secs(2), async {
        while engine
            .report()
            .await
            .map(|r| r.manifolds.contains_key(name))
            .unwrap_or(false)
        {
            sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(ok.is_ok(), "{name} was never removed");
}

fn quick() -> EngineConfig {
    EngineConfig {
        grace: Duration::from_secs(1),
        bounce_delay: Duration::from_millis(1),
        ..EngineConfig::default()
    }
}

async fn shutdown(engine: &Engine) -> Result<(), EngineError> {
    engine.kill();
    engine.wait().await
}

#[tokio::test]
async fn dependent_waits_for_its_input() {
    let h = Harness::default();
    let engine = Engine::new(quick());

    engine.install("b", h.manifold("b", &["a"])).await.unwrap();
    sleep(Duration::from_millis(20)).await;
    assert_eq!(h.starts("b"), 0);
    assert_eq!(phase_of(&engine, "b").await, Some(Phase::Idle));

    engine.install("a", h.manifold("a", &[])).await.unwrap();
    until_phase(&engine, "b", Phase::Running).await;
    assert!(h.position("start a") < h.position("start b"));

    shutdown(&engine).await.unwrap();
}

#[tokio::test]
async fn satisfied_manifold_starts_exactly_once() {
    let h = Harness::default();
    let engine = Engine::new(quick());

    engine.install("a", h.manifold("a", &[])).await.unwrap();
    until_phase(&engine, "a", Phase::Running).await;
    sleep(Duration::from_millis(20)).await;
    assert_eq!(h.starts("a"), 1);

    let report = engine.report().await.unwrap();
    assert_eq!(report.manifolds["a"].start_count, 1);
    assert_eq!(report.in_phase(Phase::Running), vec!["a"]);

    shutdown(&engine).await.unwrap();
}

#[tokio::test]
async fn kill_is_idempotent() {
    let h = Harness::default();
    let engine = Engine::new(quick());
    engine.install("a", h.manifold("a", &[])).await.unwrap();
    until_phase(&engine, "a", Phase::Running).await;

    engine.kill();
    engine.kill();
    assert!(engine.wait().await.is_ok());
    assert!(engine.wait().await.is_ok());
    assert!(h.log().contains(&"stopped a".to_string()));
    assert!(matches!(
        engine.install("x", h.manifold("x", &[])).await,
        Err(EngineError::Dying)
    ));
}

#[tokio::test]
async fn input_stopping_stops_dependent_without_error() {
    let h = Harness::default();
    let engine = Engine::new(quick());
    engine.install("a", h.manifold("a", &[])).await.unwrap();
    engine.install("b", h.manifold("b", &["a"])).await.unwrap();
    until_phase(&engine, "b", Phase::Running).await;

    h.worker("a").kill();
    until_phase(&engine, "b", Phase::Idle).await;

    sleep(Duration::from_millis(20)).await;
    assert_eq!(h.starts("a"), 1);
    assert_eq!(h.starts("b"), 1);
    let report = engine.report().await.unwrap();
    assert_eq!(report.manifolds["b"].missing, vec!["a".to_string()]);
    assert_eq!(report.manifolds["a"].last_error, None);

    shutdown(&engine).await.unwrap();
}

#[tokio::test]
async fn input_restart_restarts_dependents_after_old_worker_stops() {
    let h = Harness::default();
    let engine = Engine::new(quick());
    engine.install("a", h.manifold("a", &[])).await.unwrap();
    engine.install("b", h.manifold("b", &["a"])).await.unwrap();
    engine.install("c", h.manifold("c", &["b"])).await.unwrap();
    until_phase(&engine, "c", Phase::Running).await;
    let before = engine.report().await.unwrap().manifolds["a"].generation;

    engine.install("a", h.manifold("a", &[])).await.unwrap();
    eventually("b and c restarted", || h.starts("b") == 2 && h.starts("c") == 2).await;
    until_phase(&engine, "c", Phase::Running).await;

    assert!(h.position("stopped b") < h.last_position("start b"));
    assert!(h.position("stopped c") < h.last_position("start c"));
    assert!(h.position("stopped a") < h.last_position("start a"));
    assert!(h.last_position("start a") < h.last_position("start b"));
    let after = engine.report().await.unwrap().manifolds["a"].generation;
    assert!(after > before);

    shutdown(&engine).await.unwrap();
}

#[tokio::test]
async fn uninstall_cascades_to_dependents_only() {
    let h = Harness::default();
    let engine = Engine::new(quick());
    for (name, inputs) in [("a", &[][..]), ("b", &["a"][..]), ("c", &["b"][..]), ("d", &[][..])] {
        engine.install(name, h.manifold(name, inputs)).await.unwrap();
    }
    until_phase(&engine, "c", Phase::Running).await;
    until_phase(&engine, "d", Phase::Running).await;

    engine.uninstall("a").await.unwrap();
    until_gone(&engine, "a").await;
    until_phase(&engine, "b", Phase::Idle).await;
    until_phase(&engine, "c", Phase::Idle).await;

    let report = engine.report().await.unwrap();
    assert_eq!(report.manifolds["b"].phase, Phase::Idle);
    assert_eq!(report.manifolds["c"].phase, Phase::Idle);
    assert_eq!(report.manifolds["d"].phase, Phase::Running);
    assert_eq!(h.starts("d"), 1);

    assert!(matches!(
        engine.uninstall("a").await,
        Err(EngineError::NotFound { name }) if name == "a"
    ));

    shutdown(&engine).await.unwrap();
}

#[tokio::test]
async fn reinstall_after_uninstall_gets_a_fresh_worker() {
    let h = Harness::default();
    let engine = Engine::new(quick());
    engine.install("a", h.manifold("a", &[])).await.unwrap();
    until_phase(&engine, "a", Phase::Running).await;
    let first = h.worker("a");

    engine.uninstall("a").await.unwrap();
    until_gone(&engine, "a").await;
    engine.install("a", h.manifold("a", &[])).await.unwrap();
    until_phase(&engine, "a", Phase::Running).await;

    assert_eq!(h.starts("a"), 2);
    assert!(!Arc::ptr_eq(&first, &h.worker("a")));
    assert_eq!(engine.report().await.unwrap().manifolds["a"].start_count, 1);

    shutdown(&engine).await.unwrap();
}

#[tokio::test]
async fn critical_failure_stops_the_engine() {
    let h = Harness::default();
    let fatal_seen = Arc::new(AtomicUsize::new(0));
    let counter = fatal_seen.clone();
    let cfg = quick().with_fatal_sink(move |_err| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let engine = Engine::new(cfg);

    engine.install("a", h.manifold("a", &[])).await.unwrap();
    engine.install("b", h.manifold("b", &["a"])).await.unwrap();
    engine
        .install("c", h.manifold("c", &[]).critical())
        .await
        .unwrap();
    until_phase(&engine, "b", Phase::Running).await;
    until_phase(&engine, "c", Phase::Running).await;

    h.worker("c").finish(Err(WorkerError::fail("disk gone")));
    match engine.wait().await {
        Err(EngineError::Worker { name, source }) => {
            assert_eq!(name, "c");
            assert_eq!(source, WorkerError::fail("disk gone"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    let log = h.log();
    assert!(log.contains(&"stopped a".to_string()));
    assert!(log.contains(&"stopped b".to_string()));
    assert_eq!(fatal_seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn ordinary_failure_is_isolated_until_an_input_changes() {
    let h = Harness::default();
    let engine = Engine::new(quick());
    engine.install("a", h.manifold("a", &[])).await.unwrap();
    engine.install("b", h.manifold("b", &["a"])).await.unwrap();
    engine.install("d", h.manifold("d", &[])).await.unwrap();
    until_phase(&engine, "b", Phase::Running).await;
    until_phase(&engine, "d", Phase::Running).await;

    h.worker("b").finish(Err(WorkerError::fail("flaky")));
    until_phase(&engine, "b", Phase::Idle).await;
    sleep(Duration::from_millis(20)).await;

    let report = engine.report().await.unwrap();
    assert_eq!(report.manifolds["b"].last_error, Some(WorkerError::fail("flaky")));
    assert_eq!(report.manifolds["a"].phase, Phase::Running);
    assert_eq!(report.manifolds["d"].phase, Phase::Running);
    assert_eq!(h.starts("b"), 1);

    engine.install("a", h.manifold("a", &[])).await.unwrap();
    eventually("b retried", || h.starts("b") == 2).await;
    until_phase(&engine, "b", Phase::Running).await;
    assert_eq!(engine.report().await.unwrap().manifolds["b"].last_error, None);

    shutdown(&engine).await.unwrap();
}

#[tokio::test]
async fn cycles_are_rejected() {
    let h = Harness::default();
    let engine = Engine::new(quick());

    engine.install("a", h.manifold("a", &["b"])).await.unwrap();
    match engine.install("b", h.manifold("b", &["a"])).await {
        Err(EngineError::Cycle { name, path }) => {
            assert_eq!(name, "b");
            assert_eq!(path, vec!["b", "a", "b"]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(matches!(
        engine.install("s", h.manifold("s", &["s"])).await,
        Err(EngineError::Cycle { .. })
    ));

    let report = engine.report().await.unwrap();
    assert!(!report.manifolds.contains_key("b"));
    assert!(!report.manifolds.contains_key("s"));

    shutdown(&engine).await.unwrap();
}

#[tokio::test]
async fn replacing_output_with_none_conflicts_with_dependents() {
    let h = Harness::default();
    let engine = Engine::new(quick());
    engine.install("a", h.manifold("a", &[])).await.unwrap();
    engine.install("b", h.manifold("b", &["a"])).await.unwrap();

    let bare = Manifold::new(Vec::<String>::new(), |_res| async {
        Ok(Arc::new(crate::workers::ValueWorker::new(())) as WorkerRef)
    });
    match engine.install("a", bare.clone()).await {
        Err(EngineError::AlreadyRunningConflict { name, dependents }) => {
            assert_eq!(name, "a");
            assert_eq!(dependents, vec!["b".to_string()]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    engine.install("z", bare.clone()).await.unwrap();
    engine.install("z", bare).await.unwrap();

    shutdown(&engine).await.unwrap();
}

#[tokio::test]
async fn missing_from_start_waits_for_a_dependency_change() {
    let h = Harness::default();
    let engine = Engine::new(quick());
    engine.install("a", h.manifold("a", &[])).await.unwrap();
    until_phase(&engine, "a", Phase::Running).await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let picky = Manifold::new(["a"], move |_res| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                Err(WorkerError::Missing)
            } else {
                Ok(Arc::new(crate::workers::ValueWorker::new(n)) as WorkerRef)
            }
        }
    });
    engine.install("p", picky).await.unwrap();
    eventually("first attempt", || calls.load(Ordering::SeqCst) == 1).await;
    sleep(Duration::from_millis(30)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(phase_of(&engine, "p").await, Some(Phase::Idle));

    engine.install("a", h.manifold("a", &[])).await.unwrap();
    until_phase(&engine, "p", Phase::Running).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    shutdown(&engine).await.unwrap();
}

#[tokio::test]
async fn bounce_restarts_the_worker() {
    let h = Harness::default();
    let engine = Engine::new(quick());
    engine.install("a", h.manifold("a", &[])).await.unwrap();
    until_phase(&engine, "a", Phase::Running).await;

    h.worker("a").finish(Err(WorkerError::Bounce));
    eventually("a restarted", || h.starts("a") == 2).await;
    until_phase(&engine, "a", Phase::Running).await;
    assert_eq!(engine.report().await.unwrap().manifolds["a"].last_error, None);

    shutdown(&engine).await.unwrap();
}

#[tokio::test]
async fn finished_input_is_missing_to_a_starting_dependent() {
    let h = Harness::default();
    let engine = Engine::new(quick());
    engine.install("a", h.manifold("a", &[])).await.unwrap();
    until_phase(&engine, "a", Phase::Running).await;

    let reads: Arc<Mutex<Vec<Result<String, ResourceError>>>> = Arc::default();
    let record = reads.clone();
    let hh = h.clone();
    let reader = Manifold::new(["a"], move |res: Resources| {
        let input = hh.worker("a");
        let record = record.clone();
        async move {
            record.lock().unwrap().push(res.get::<String>("a"));
            input.kill();
            assert_eq!(input.wait().await, Ok(()));
            record.lock().unwrap().push(res.get::<String>("a"));
            Err(WorkerError::Missing)
        }
    });
    engine.install("r", reader).await.unwrap();

    eventually("two reads", || reads.lock().unwrap().len() == 2).await;
    assert_eq!(
        *reads.lock().unwrap(),
        vec![
            Ok("a".to_string()),
            Err(ResourceError::Missing { name: "a".into() }),
        ]
    );
    until_phase(&engine, "a", Phase::Idle).await;

    shutdown(&engine).await.unwrap();
}

#[tokio::test]
async fn filter_downgrades_critical_exit_to_missing() {
    let h = Harness::default();
    let engine = Engine::new(quick());
    engine.install("a", h.manifold("a", &[])).await.unwrap();
    let guarded = h
        .manifold("c", &["a"])
        .critical()
        .with_filter(|err| match err {
            WorkerError::Fail { .. } => WorkerError::Missing,
            other => other,
        });
    engine.install("c", guarded).await.unwrap();
    until_phase(&engine, "c", Phase::Running).await;

    h.worker("c").finish(Err(WorkerError::fail("connection reset")));
    until_phase(&engine, "c", Phase::Idle).await;
    sleep(Duration::from_millis(30)).await;

    assert!(!engine.is_killed());
    let report = engine.report().await.unwrap();
    assert_eq!(report.state, EngineState::Running);
    assert_eq!(report.manifolds["c"].last_error, None);
    assert_eq!(report.manifolds["c"].phase, Phase::Idle);
    assert_eq!(h.starts("c"), 1);

    engine.install("a", h.manifold("a", &[])).await.unwrap();
    eventually("c restarted", || h.starts("c") == 2).await;
    until_phase(&engine, "c", Phase::Running).await;

    shutdown(&engine).await.unwrap();
}

#[tokio::test]
async fn filter_turns_start_error_into_bounce() {
    let engine = Engine::new(quick());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let flaky = Manifold::new(Vec::<String>::new(), move |_res| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                Err(WorkerError::fail("not ready"))
            } else {
                Ok(Arc::new(crate::workers::ValueWorker::new(n)) as WorkerRef)
            }
        }
    })
    .with_filter(|err| match err {
        WorkerError::Fail { .. } => WorkerError::Bounce,
        other => other,
    });
    engine.install("f", flaky).await.unwrap();

    until_phase(&engine, "f", Phase::Running).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(engine.report().await.unwrap().manifolds["f"].last_error, None);

    shutdown(&engine).await.unwrap();
}

#[tokio::test]
async fn worker_can_ask_for_uninstall() {
    let h = Harness::default();
    let engine = Engine::new(quick());
    engine.install("a", h.manifold("a", &[])).await.unwrap();
    engine.install("b", h.manifold("b", &["a"])).await.unwrap();
    until_phase(&engine, "b", Phase::Running).await;

    h.worker("a").finish(Err(WorkerError::Uninstall));
    until_gone(&engine, "a").await;
    until_phase(&engine, "b", Phase::Idle).await;
    assert_eq!(h.starts("b"), 1);

    shutdown(&engine).await.unwrap();
}

#[tokio::test]
async fn accessor_expires_when_start_returns() {
    let h = Harness::default();
    let engine = Engine::new(quick());
    engine.install("a", h.manifold("a", &[])).await.unwrap();

    let kept: Arc<Mutex<Option<Resources>>> = Arc::default();
    let stash = kept.clone();
    let reader = Manifold::new(["a"], move |res: Resources| {
        let stash = stash.clone();
        async move {
            let name: String = res.get("a")?;
            assert_eq!(name, "a");
            assert!(matches!(
                res.get::<String>("elsewhere"),
                Err(ResourceError::Undeclared { .. })
            ));
            *stash.lock().unwrap() = Some(res);
            Ok(Arc::new(crate::workers::ValueWorker::new(())) as WorkerRef)
        }
    });
    engine.install("r", reader).await.unwrap();
    until_phase(&engine, "r", Phase::Running).await;

    let res = kept.lock().unwrap().clone().unwrap();
    assert!(res.is_expired());
    assert_eq!(res.get::<String>("a"), Err(ResourceError::Expired));

    shutdown(&engine).await.unwrap();
}

#[tokio::test]
async fn start_panic_is_recorded_under_recover() {
    let engine = Engine::new(quick());
    let boom = Manifold::new(Vec::<String>::new(), |_res| async {
        if true {
            panic!("start exploded");
        }
        Ok(Arc::new(crate::workers::ValueWorker::new(())) as WorkerRef)
    });
    engine.install("boom", boom).await.unwrap();

    let ok = timeout(Duration::from_secs(2), async {
        loop {
            let report = engine.report().await.unwrap();
            if let Some(WorkerError::Panicked { info }) = &report.manifolds["boom"].last_error {
                break info.clone();
            }
            sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(ok.unwrap().contains("start exploded"));

    shutdown(&engine).await.unwrap();
}

#[tokio::test]
async fn start_panic_is_fatal_under_propagate() {
    let engine = Engine::new(EngineConfig {
        panic_policy: PanicPolicy::Propagate,
        ..quick()
    });
    let boom = Manifold::new(Vec::<String>::new(), |_res| async {
        if true {
            panic!("start exploded");
        }
        Ok(Arc::new(crate::workers::ValueWorker::new(())) as WorkerRef)
    });
    engine.install("boom", boom).await.unwrap();

    match engine.wait().await {
        Err(EngineError::Panicked { name, info }) => {
            assert_eq!(name, "boom");
            assert!(info.contains("start exploded"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

/// Worker that ignores kill.
struct Stubborn;

#[async_trait]
impl Worker for Stubborn {
    fn kill(&self) {}

    async fn wait(&self) -> Result<(), WorkerError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[tokio::test]
async fn grace_exceeded_names_stuck_manifolds() {
    let engine = Engine::new(EngineConfig {
        grace: Duration::from_millis(50),
        ..quick()
    });
    let stubborn = Manifold::new(Vec::<String>::new(), |_res| async {
        Ok(Arc::new(Stubborn) as WorkerRef)
    });
    engine.install("mule", stubborn).await.unwrap();
    until_phase(&engine, "mule", Phase::Running).await;

    match shutdown(&engine).await {
        Err(EngineError::GraceExceeded { grace, stuck }) => {
            assert_eq!(grace, Duration::from_millis(50));
            assert_eq!(stuck, vec!["mule".to_string()]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<(EventKind, Option<String>)>>);

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, ev: &Event) {
        self.0
            .lock()
            .unwrap()
            .push((ev.kind, ev.manifold.as_deref().map(str::to_string)));
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test]
async fn subscribers_see_lifecycle_through_shutdown() {
    let h = Harness::default();
    let recorder = Arc::new(Recorder::default());
    let engine = Engine::builder(quick())
        .with_subscriber(recorder.clone())
        .build();

    engine.install("a", h.manifold("a", &[])).await.unwrap();
    engine.install("b", h.manifold("b", &["a"])).await.unwrap();
    until_phase(&engine, "b", Phase::Running).await;
    engine.install("a", h.manifold("a", &[])).await.unwrap();
    until_phase(&engine, "b", Phase::Running).await;
    shutdown(&engine).await.unwrap();

    let seen = recorder.0.lock().unwrap().clone();
    let has = |kind: EventKind, name: Option<&str>| {
        seen.iter()
            .any(|(k, n)| *k == kind && n.as_deref() == name)
    };
    assert!(has(EventKind::ManifoldInstalled, Some("a")));
    assert!(has(EventKind::ManifoldReplaced, Some("a")));
    assert!(has(EventKind::ManifoldStarted, Some("b")));
    assert!(has(EventKind::DependentsInvalidated, Some("a")));
    assert!(has(EventKind::ShutdownRequested, None));
    assert!(has(EventKind::AllStoppedWithin, None));
}

#[tokio::test]
async fn report_lists_missing_inputs_and_criticality() {
    let h = Harness::default();
    let engine = Engine::new(quick());
    engine
        .install("b", h.manifold("b", &["a", "x"]).critical())
        .await
        .unwrap();
    engine.install("a", h.manifold("a", &[])).await.unwrap();
    until_phase(&engine, "a", Phase::Running).await;

    let report = engine.report().await.unwrap();
    assert_eq!(report.state, EngineState::Running);
    let b = &report.manifolds["b"];
    assert_eq!(b.phase, Phase::Idle);
    assert_eq!(b.inputs, vec!["a".to_string(), "x".to_string()]);
    assert_eq!(b.missing, vec!["x".to_string()]);
    assert!(b.critical);
    assert_eq!(b.generation, 0);

    shutdown(&engine).await.unwrap();
}
