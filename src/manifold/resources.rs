//! # Resource accessor handed to start routines.
//!
//! [`Resources`] is the only way a start routine can see other manifolds. It is
//! built fresh for every start attempt and bound to the generations of the
//! inputs that were running when the attempt began.
//!
//! ## Rules
//! - Only declared inputs can be read (`Undeclared` otherwise).
//! - An input restarted since the attempt began reads as `Missing`.
//! - Once the start routine returns, every lookup fails with `Expired`.
//! - The requested type is checked on every call against what the input's
//!   output projection writes (`TypeMismatch` otherwise).
//!
//! ## Lookup path
//! ```text
//! res.get::<T>(name)
//!   ├─► expired?                        → Expired
//!   ├─► declared input?                 → Undeclared
//!   ├─► published with seen generation? → Missing
//!   ├─► worker already finished?        → Missing
//!   ├─► output projection present?      → NoOutput
//!   └─► output(worker, OutputSlot<T>)   → T | TypeMismatch
//! ```

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::error::ResourceError;
use crate::testing::StubResources;
use crate::workers::{Worker, WorkerRef};

/// Output projection: writes a view of the worker into the requested slot.
pub type OutputFn =
    Arc<dyn Fn(&dyn Worker, &mut OutputSlot<'_>) -> Result<(), ResourceError> + Send + Sync>;

/// Typed, caller-supplied destination for an output projection.
///
/// Wraps an `&mut Option<T>` chosen by the reader. A projection calls
/// [`OutputSlot::put`] with the value it can offer; offering the wrong type
/// fails instead of silently converting.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use depvisor::{Manifold, ValueWorker, Worker, WorkerRef};
///
/// let m = Manifold::new(Vec::<String>::new(), |_res| async {
///     Ok(Arc::new(ValueWorker::new(7u32)) as WorkerRef)
/// })
/// .with_output(ValueWorker::<u32>::output);
/// assert!(m.has_output());
/// ```
pub struct OutputSlot<'a> {
    name: &'a str,
    expected: &'static str,
    slot: &'a mut dyn Any,
}

impl<'a> OutputSlot<'a> {
    pub(crate) fn new<T: Any>(name: &'a str, slot: &'a mut Option<T>) -> Self {
        Self {
            name,
            expected: type_name::<T>(),
            slot,
        }
    }

    /// Writes `value` if the reader asked for exactly `T`.
    pub fn put<T: Any>(&mut self, value: T) -> Result<(), ResourceError> {
        match self.slot.downcast_mut::<Option<T>>() {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(ResourceError::TypeMismatch {
                name: self.name.to_string(),
                expected: self.expected,
                offered: type_name::<T>(),
            }),
        }
    }

    /// True if the reader asked for `T`.
    pub fn accepts<T: Any>(&self) -> bool {
        self.slot.is::<Option<T>>()
    }

    /// Name of the type the reader asked for.
    pub fn expected(&self) -> &'static str {
        self.expected
    }

    /// Name of the manifold being read.
    pub fn name(&self) -> &str {
        self.name
    }
}

/// A worker made visible to dependents.
#[derive(Clone)]
pub(crate) struct Published {
    pub worker: WorkerRef,
    pub output: Option<OutputFn>,
    pub generation: u64,
}

/// Running workers visible to resource lookups.
///
/// Written only by the engine loop. Readers hold the read lock for the whole
/// projection, so the loop cannot unpublish (and then kill) a worker while one
/// of its outputs is being read.
#[derive(Clone, Default)]
pub(crate) struct Outputs {
    inner: Arc<RwLock<HashMap<String, Published>>>,
}

impl Outputs {
    pub fn publish(&self, name: &str, published: Published) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(name.to_string(), published);
    }

    pub fn unpublish(&self, name: &str) -> bool {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.remove(name).is_some()
    }

    /// Removes `name` only if it still holds the worker of `generation`.
    pub fn unpublish_if(&self, name: &str, generation: u64) -> bool {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if map.get(name).is_some_and(|p| p.generation == generation) {
            map.remove(name);
            true
        } else {
            false
        }
    }

    fn project(
        &self,
        name: &str,
        seen: u64,
        slot: &mut OutputSlot<'_>,
    ) -> Result<(), ResourceError> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let published = map
            .get(name)
            .filter(|p| p.generation == seen)
            // A worker whose wait has resolved is gone even if the loop
            // has not processed its exit yet.
            .filter(|p| p.worker.wait().now_or_never().is_none())
            .ok_or_else(|| ResourceError::Missing {
                name: name.to_string(),
            })?;
        let output = published
            .output
            .as_ref()
            .ok_or_else(|| ResourceError::NoOutput {
                name: name.to_string(),
            })?;
        output(published.worker.as_ref(), slot)
    }
}

enum Source {
    Engine {
        outputs: Outputs,
        seen: HashMap<String, u64>,
    },
    Stub(StubResources),
}

struct Inner {
    owner: String,
    source: Source,
    expired: AtomicBool,
    abort: CancellationToken,
}

/// # Typed, read-only view of a start routine's inputs.
///
/// Cheap to clone; all clones expire together when the start routine returns.
#[derive(Clone)]
pub struct Resources {
    inner: Arc<Inner>,
}

impl Resources {
    /// Engine-side constructor: `seen` maps each declared input to the
    /// generation it had when the attempt began.
    pub(crate) fn bound(
        owner: &str,
        outputs: Outputs,
        seen: HashMap<String, u64>,
        abort: CancellationToken,
    ) -> Self {
        Self::from_source(owner, Source::Engine { outputs, seen }, abort)
    }

    pub(crate) fn stubbed(owner: &str, stub: StubResources) -> Self {
        Self::from_source(owner, Source::Stub(stub), CancellationToken::new())
    }

    fn from_source(owner: &str, source: Source, abort: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                owner: owner.to_string(),
                source,
                expired: AtomicBool::new(false),
                abort,
            }),
        }
    }

    /// Reads the current output of input `name` as a `T`.
    pub fn get<T: Any>(&self, name: &str) -> Result<T, ResourceError> {
        if self.inner.expired.load(Ordering::Acquire) {
            return Err(ResourceError::Expired);
        }

        let mut value: Option<T> = None;
        {
            let mut slot = OutputSlot::new(name, &mut value);
            match &self.inner.source {
                Source::Engine { outputs, seen } => {
                    let seen = *seen.get(name).ok_or_else(|| ResourceError::Undeclared {
                        name: name.to_string(),
                    })?;
                    outputs.project(name, seen, &mut slot)?;
                }
                Source::Stub(stub) => stub.project(name, &mut slot)?,
            }
        }

        value.ok_or_else(|| ResourceError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
            offered: "nothing",
        })
    }

    /// Token cancelled when this start attempt is no longer wanted.
    ///
    /// Slow start routines should select on it; the engine discards whatever
    /// an aborted attempt returns.
    pub fn abort(&self) -> CancellationToken {
        self.inner.abort.clone()
    }

    /// Name of the manifold being started.
    pub fn owner(&self) -> &str {
        &self.inner.owner
    }

    /// True once the start routine has returned.
    pub fn is_expired(&self) -> bool {
        self.inner.expired.load(Ordering::Acquire)
    }

    pub(crate) fn expire(&self) {
        self.inner.expired.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for Resources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resources")
            .field("owner", &self.inner.owner)
            .field("expired", &self.is_expired())
            .finish_non_exhaustive()
    }
}
