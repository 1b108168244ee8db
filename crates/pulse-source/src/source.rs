//! Instrument source seam.

use crate::error::SourceResult;
use futures_util::future::BoxFuture;
use pulse_core::{Category, Instrument};

/// Supplies the complete instrument list of a category.
pub trait InstrumentSource: Send + Sync + 'static {
    fn fetch(&self, category: Category) -> BoxFuture<'static, SourceResult<Vec<Instrument>>>;
}
