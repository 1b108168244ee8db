//! Instrument catalog and flash tracking.
//!
//! `Catalog` holds the latest known state of every instrument and merges
//! ticks under monotonic-timestamp rules. `FlashTracker` keeps short-lived
//! "recently updated" markers derived from catalog changes.

pub mod catalog;
pub mod error;
pub mod flash;

pub use catalog::{
    Catalog, CatalogChange, CatalogStats, CategorySnapshot, ChangeKind, LoadOutcome, MergeOutcome,
};
pub use error::{FeedError, FeedResult};
pub use flash::{FlashMarker, FlashTracker};
