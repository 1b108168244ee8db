//! Ingestion channel error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connect timed out after {0}ms")]
    ConnectTimeout(u64),

    #[error("No message received for {0}ms")]
    IdleTimeout(u64),

    /// A downstream payload failed decoding or validation. Dropped, not fatal.
    #[error("Malformed tick: {0}")]
    MalformedTick(String),

    #[error("Max reconnection attempts reached ({0})")]
    RetriesExhausted(u32),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WsError {
    /// True for errors that concern a single payload rather than the connection.
    pub fn is_payload_error(&self) -> bool {
        matches!(self, Self::MalformedTick(_))
    }
}

pub type WsResult<T> = Result<T, WsError>;
