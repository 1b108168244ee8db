//! View error types.

use crate::registry::ViewId;
use pulse_core::CoreError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("Unknown view: {0}")]
    UnknownView(ViewId),

    #[error("Configuration error: {0}")]
    InvalidConfig(#[from] CoreError),
}

pub type ViewResult<T> = Result<T, ViewError>;
