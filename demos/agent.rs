//! # Example: Agent
//!
//! A small agent graph:
//!
//! ```text
//! config (critical) ──► api-caller ──► uniter
//!                                  └─► reporter (retries with backoff)
//! ```
//!
//! After a moment the config is replaced, which restarts everything
//! downstream; later `uniter` is uninstalled. Ctrl-C (or the 3s timer) stops
//! the engine.
//!
//! Run with: `cargo run --example agent --features logging`

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use depvisor::{
    BackoffPolicy, Engine, EngineConfig, JitterPolicy, LogWriter, Manifold, RestartPolicy,
    TaskParams, TaskWorker, ValueWorker, WorkerError, WorkerRef, single_input,
};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
struct AgentConfig {
    controller: String,
}

#[derive(Clone, Debug)]
struct ApiConn {
    addr: String,
}

fn config(controller: &str) -> Manifold {
    let cfg = AgentConfig {
        controller: controller.to_string(),
    };
    Manifold::new(Vec::<String>::new(), move |_res| {
        let cfg = cfg.clone();
        async move { Ok(Arc::new(ValueWorker::new(cfg)) as WorkerRef) }
    })
    .with_output(ValueWorker::<AgentConfig>::output)
    .critical()
}

fn api_caller() -> Manifold {
    single_input("config", |cfg: AgentConfig| async move {
        let conn = ApiConn {
            addr: format!("{}:17070", cfg.controller),
        };
        Ok(Arc::new(ValueWorker::new(conn)) as WorkerRef)
    })
    .with_output(ValueWorker::<ApiConn>::output)
}

fn uniter() -> Manifold {
    single_input("api-caller", |conn: ApiConn| async move {
        let worker = TaskWorker::spawn("uniter", TaskParams::default(), move |ctx: CancellationToken| {
            let addr = conn.addr.clone();
            async move {
                loop {
                    tokio::select! {
                        _ = ctx.cancelled() => return Ok::<(), WorkerError>(()),
                        _ = tokio::time::sleep(Duration::from_millis(400)) => {
                            tracing::info!(%addr, "uniter: hooks settled");
                        }
                    }
                }
            }
        });
        Ok(Arc::new(worker) as WorkerRef)
    })
}

fn reporter() -> Manifold {
    let params = TaskParams {
        restart: RestartPolicy::OnFailure,
        backoff: BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        },
        timeout: Some(Duration::from_secs(1)),
    };
    single_input("api-caller", move |conn: ApiConn| async move {
        let attempts = Arc::new(AtomicU32::new(0));
        let worker = TaskWorker::spawn("reporter", params, move |ctx: CancellationToken| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            let addr = conn.addr.clone();
            async move {
                if n < 2 {
                    return Err(WorkerError::fail(format!("{addr} refused status report")));
                }
                tracing::info!(%addr, attempt = n, "reporter: status sent");
                ctx.cancelled().await;
                Ok(())
            }
        });
        Ok(Arc::new(worker) as WorkerRef)
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::DEBUG.into()),
        )
        .init();

    let cfg = EngineConfig {
        grace: Duration::from_secs(5),
        ..EngineConfig::default()
    }
    .with_fatal_sink(|err| tracing::error!(error = %err, "agent going down"));

    let engine = Engine::builder(cfg)
        .with_subscriber(Arc::new(LogWriter))
        .build();

    engine.install("uniter", uniter()).await?;
    engine.install("reporter", reporter()).await?;
    engine.install("api-caller", api_caller()).await?;
    engine.install("config", config("10.0.0.1")).await?;

    let driver = engine.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let _ = driver.install("config", config("10.0.0.2")).await;

        tokio::time::sleep(Duration::from_millis(1000)).await;
        let _ = driver.uninstall("uniter").await;
        if let Ok(report) = driver.report().await {
            for (name, m) in &report.manifolds {
                println!("{name:<12} {:?} gen={} starts={}", m.phase, m.generation, m.start_count);
            }
        }

        tokio::time::sleep(Duration::from_millis(1000)).await;
        driver.kill();
    });

    engine.wait_or_signal().await?;
    Ok(())
}
