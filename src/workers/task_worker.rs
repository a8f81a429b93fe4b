//! # TaskWorker: closure-backed worker with its own retry loop.
//!
//! The engine never retries a failed manifold by itself; retrying is the
//! task's business. [`TaskWorker`] spawns a closure `Fn(CancellationToken) -> Fut`
//! on tokio and re-runs it according to a [`RestartPolicy`] and
//! [`BackoffPolicy`], reporting only its final outcome through [`Worker::wait`].
//!
//! ## Attempt loop
//! ```text
//! loop {
//!   ├─► cancelled? → Ok
//!   ├─► run_once(f, token, timeout)   (panics caught → Panicked)
//!   │       ├─ Ok ──► Never / OnFailure → Ok
//!   │       │         Always{interval}  → sleep(interval), continue
//!   │       ├─ Canceled               → Ok
//!   │       ├─ Missing/Bounce/Uninstall → return as-is (engine sentinels)
//!   │       └─ Err ─► Never           → Err
//!   │                 OnFailure/Always → sleep(backoff.next(failures)), continue
//!   └─► every sleep is cut short by kill()
//! }
//! ```
//!
//! ## Rules
//! - Attempts run **sequentially** (never concurrent for one worker)
//! - Backoff counter **resets on success**
//! - `kill()` cancels the token handed to the closure; the closure should
//!   return promptly once it fires

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;
use crate::policies::{BackoffPolicy, RestartPolicy};
use crate::workers::worker::Worker;

/// Retry parameters for a [`TaskWorker`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TaskParams {
    /// When to run the closure again.
    pub restart: RestartPolicy,
    /// How long to wait between failed attempts.
    pub backoff: BackoffPolicy,
    /// Optional per-attempt timeout (`None` = no timeout).
    pub timeout: Option<Duration>,
}

impl TaskParams {
    /// Single attempt, no restarts.
    pub fn once() -> Self {
        Self {
            restart: RestartPolicy::Never,
            ..Self::default()
        }
    }
}

/// Closure-backed worker.
///
/// ## Example
/// ```rust
/// use depvisor::{TaskParams, TaskWorker, Worker, WorkerError};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let w = TaskWorker::spawn("ticker", TaskParams::default(), |ctx: CancellationToken| async move {
///     ctx.cancelled().await;
///     Ok::<(), WorkerError>(())
/// });
/// w.kill();
/// assert_eq!(w.wait().await, Ok(()));
/// # }
/// ```
#[derive(Debug)]
pub struct TaskWorker {
    name: Cow<'static, str>,
    token: CancellationToken,
    done: watch::Receiver<Option<Result<(), WorkerError>>>,
}

impl TaskWorker {
    /// Spawns the closure on the current tokio runtime.
    pub fn spawn<F, Fut>(name: impl Into<Cow<'static, str>>, params: TaskParams, f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let (tx, done) = watch::channel(None);

        let run_token = token.clone();
        tokio::spawn(async move {
            let res = supervise(f, params, run_token).await;
            let _ = tx.send(Some(res));
        });

        Self {
            name: name.into(),
            token,
            done,
        }
    }

    /// Spawns the closure for a single attempt.
    pub fn once<F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
    {
        Self::spawn(name, TaskParams::once(), f)
    }

    /// Human-readable worker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wraps the worker in a shared handle.
    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl Worker for TaskWorker {
    fn kill(&self) {
        self.token.cancel();
    }

    async fn wait(&self) -> Result<(), WorkerError> {
        let mut rx = self.done.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(res) => res.clone().unwrap_or(Ok(())),
            // Runtime dropped the task before it reported.
            Err(_) => Err(WorkerError::Canceled),
        }
    }
}

async fn supervise<F, Fut>(f: F, params: TaskParams, token: CancellationToken) -> Result<(), WorkerError>
where
    F: Fn(CancellationToken) -> Fut,
    Fut: Future<Output = Result<(), WorkerError>>,
{
    let mut failures: u32 = 0;

    loop {
        if token.is_cancelled() {
            return Ok(());
        }

        match run_once(&f, &token, params.timeout).await {
            Ok(()) | Err(WorkerError::Canceled) if token.is_cancelled() => return Ok(()),
            Ok(()) => {
                failures = 0;
                match params.restart {
                    RestartPolicy::Always { interval } => {
                        if let Some(delay) = interval {
                            if !sleep_or_cancel(delay, &token).await {
                                return Ok(());
                            }
                        }
                    }
                    RestartPolicy::OnFailure | RestartPolicy::Never => return Ok(()),
                }
            }
            Err(WorkerError::Canceled) => return Ok(()),
            Err(e) if e.is_sentinel() => return Err(e),
            Err(e) => {
                if matches!(params.restart, RestartPolicy::Never) {
                    return Err(e);
                }
                let delay = params.backoff.next(failures);
                failures = failures.saturating_add(1);
                if !sleep_or_cancel(delay, &token).await {
                    return Err(e);
                }
            }
        }
    }
}

/// Runs one attempt with a child token, optional timeout and panic capture.
async fn run_once<F, Fut>(
    f: &F,
    parent: &CancellationToken,
    timeout: Option<Duration>,
) -> Result<(), WorkerError>
where
    F: Fn(CancellationToken) -> Fut,
    Fut: Future<Output = Result<(), WorkerError>>,
{
    let child = parent.child_token();
    let attempt = std::panic::AssertUnwindSafe(f(child.clone())).catch_unwind();

    let caught = match timeout.filter(|d| *d > Duration::ZERO) {
        Some(dur) => match time::timeout(dur, attempt).await {
            Ok(caught) => caught,
            Err(_elapsed) => {
                child.cancel();
                return Err(WorkerError::fail(format!("timed out after {dur:?}")));
            }
        },
        None => attempt.await,
    };

    caught.unwrap_or_else(|payload| {
        Err(WorkerError::Panicked {
            info: crate::core::panic_message(payload.as_ref()),
        })
    })
}

/// Sleeps for `delay`; returns `false` if cancelled first.
async fn sleep_or_cancel(delay: Duration, token: &CancellationToken) -> bool {
    select! {
        _ = time::sleep(delay) => true,
        _ = token.cancelled() => false,
    }
}
