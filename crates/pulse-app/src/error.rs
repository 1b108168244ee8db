//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value: {0}")]
    Core(#[from] pulse_core::CoreError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<pulse_ws::WsError>),

    #[error("View error: {0}")]
    View(#[from] pulse_view::ViewError),

    #[error("Source error: {0}")]
    Source(#[from] pulse_source::SourceError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] pulse_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
