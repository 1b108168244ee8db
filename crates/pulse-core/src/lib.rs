//! Core domain types for the pulse instrument catalog.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - `InstrumentId`, `Instrument`: catalog entries keyed by an opaque id
//! - `Category`, `Phase`: the fixed classification sets
//! - `Price`: precision-safe price newtype
//! - `Tick`: validated price update coming off the wire
//! - `ViewConfig`, `ColumnConfig`: per-view sort/filter configuration
//! - `ConnectionStatus`: externally observable ingestion state

pub mod decimal;
pub mod error;
pub mod instrument;
pub mod status;
pub mod tick;
pub mod view;

pub use decimal::Price;
pub use error::{CoreError, Result};
pub use instrument::{Category, Instrument, InstrumentId, Phase};
pub use status::ConnectionStatus;
pub use tick::{RawTick, Tick};
pub use view::{
    ColumnConfig, FilterPatch, PhaseFilter, SortDirection, SortKey, ViewConfig, ViewFilter,
};

/// Current wall-clock time in Unix milliseconds.
///
/// All catalog timestamps (`created_at`, `updated_at`, tick timestamps,
/// flash deadlines) share this unit.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
