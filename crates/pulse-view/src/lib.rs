//! View projection.
//!
//! `project` turns a catalog category into the sorted, filtered list a column
//! displays. `ViewRegistry` keeps one memoized projection per open view and
//! pushes a new `ViewState` to subscribers whenever it actually changes.

pub mod error;
pub mod projector;
pub mod registry;

pub use error::{ViewError, ViewResult};
pub use projector::{compare, project};
pub use registry::{Projection, ViewId, ViewRegistry, ViewState};
