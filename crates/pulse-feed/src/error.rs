//! Feed error types.

use pulse_core::{Category, CoreError, InstrumentId};
use thiserror::Error;

/// Reasons a record is refused by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("Instrument not found: {0}")]
    UnknownInstrument(InstrumentId),

    #[error("Category mismatch for {id}: loading {expected}, record says {actual}")]
    CategoryMismatch {
        id: InstrumentId,
        expected: Category,
        actual: Category,
    },

    /// Ids are global; an instrument never changes category.
    #[error("Id collision for {id}: already in {existing}, offered for {incoming}")]
    IdCollision {
        id: InstrumentId,
        existing: Category,
        incoming: Category,
    },

    #[error(transparent)]
    Invalid(#[from] CoreError),
}

pub type FeedResult<T> = Result<T, FeedError>;
