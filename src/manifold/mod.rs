//! # Manifolds and the resource accessor.
//!
//! - [`Manifold`] - declarative descriptor of one task (inputs, start, output, filter)
//! - [`Resources`] - typed view of a start routine's inputs
//! - [`OutputSlot`] - typed destination an output projection writes into
//! - [`single_input`] - the common "one input, one constructor" shape

mod helpers;
mod manifold;
mod resources;

pub use helpers::single_input;
pub use manifold::{BoxStartFuture, FilterFn, Manifold, StartFn};
pub use resources::{OutputFn, OutputSlot, Resources};

pub(crate) use resources::{Outputs, Published};
