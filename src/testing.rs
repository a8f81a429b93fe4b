//! # Test helpers for manifold authors.
//!
//! [`StubResources`] builds a [`Resources`] accessor from canned outputs and
//! errors, so a manifold's start routine can be exercised without an engine.
//!
//! ```
//! use depvisor::{ResourceError, testing::StubResources};
//!
//! let res = StubResources::new()
//!     .with_output("api-caller", 7u32)
//!     .with_error("agent", ResourceError::Missing { name: "agent".into() })
//!     .resources("under-test");
//!
//! assert_eq!(res.get::<u32>("api-caller"), Ok(7));
//! assert!(res.get::<u32>("agent").is_err());
//! assert!(res.get::<u32>("other").is_err());
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ResourceError;
use crate::manifold::{OutputSlot, Resources};

type StubProjection = Arc<dyn Fn(&mut OutputSlot<'_>) -> Result<(), ResourceError> + Send + Sync>;

fn projection<F>(f: F) -> StubProjection
where
    F: Fn(&mut OutputSlot<'_>) -> Result<(), ResourceError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Canned resources keyed by input name.
#[derive(Clone, Default)]
pub struct StubResources {
    entries: HashMap<String, StubProjection>,
}

impl StubResources {
    /// Creates an empty set; every lookup reads as undeclared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `value` (cloned per lookup) for input `name`.
    pub fn with_output<T>(mut self, name: &str, value: T) -> Self
    where
        T: Any + Clone + Send + Sync,
    {
        self.entries
            .insert(name.to_string(), projection(move |slot| slot.put(value.clone())));
        self
    }

    /// Fails every lookup of input `name` with `err`.
    pub fn with_error(mut self, name: &str, err: ResourceError) -> Self {
        self.entries
            .insert(name.to_string(), projection(move |_slot| Err(err.clone())));
        self
    }

    /// Builds an accessor for a start routine of manifold `owner`.
    pub fn resources(self, owner: &str) -> Resources {
        Resources::stubbed(owner, self)
    }

    pub(crate) fn project(
        &self,
        name: &str,
        slot: &mut OutputSlot<'_>,
    ) -> Result<(), ResourceError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| ResourceError::Undeclared {
                name: name.to_string(),
            })?;
        entry(slot)
    }
}
