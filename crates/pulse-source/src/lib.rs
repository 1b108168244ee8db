//! Bulk instrument loading.
//!
//! An `InstrumentSource` returns the full instrument list of one category.
//! `Loader` applies the refetch policy and upserts results into the catalog.

pub mod client;
pub mod error;
pub mod loader;
pub mod source;

pub use client::RestInstrumentSource;
pub use error::{SourceError, SourceResult};
pub use loader::{Loader, LoaderConfig};
pub use source::InstrumentSource;
