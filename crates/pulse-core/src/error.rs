//! Error types for pulse-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A tick payload failed validation at the ingestion boundary.
    #[error("Invalid tick: {0}")]
    InvalidTick(String),

    /// An instrument record failed validation.
    #[error("Invalid instrument: {0}")]
    InvalidInstrument(String),

    /// A view or column configuration is invalid (programming error).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A closed enumeration received a value outside its set.
    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
