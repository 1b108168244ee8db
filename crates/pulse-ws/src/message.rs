//! Wire message types.
//!
//! Upstream the client sends a single subscribe request. Downstream frames are
//! either a tagged object (`{"type": "tick" | "subscribed" | "error", ...}`),
//! an untagged tick object, or a plain array of ticks.

use pulse_core::{InstrumentId, Tick};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Upstream
// ============================================================================

/// Subscribe request sent after the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeRequest {
    pub method: &'static str,
    pub ids: Vec<InstrumentId>,
}

impl SubscribeRequest {
    pub fn new(ids: &[InstrumentId]) -> Self {
        Self {
            method: "subscribe",
            ids: ids.to_vec(),
        }
    }
}

// ============================================================================
// Downstream
// ============================================================================

/// One decoded downstream item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Tick(Tick),
    /// Server acknowledged the subscription.
    Subscribed(Vec<InstrumentId>),
    /// Server-side error report.
    ServerError(String),
    /// Payload that failed decoding or validation.
    Malformed(String),
    /// Well-formed message of a type this client does not handle.
    Ignored(String),
}

#[derive(Debug, Deserialize)]
struct SubscribedPayload {
    #[serde(default)]
    ids: Vec<InstrumentId>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default, alias = "error")]
    message: Option<String>,
}

/// Decode one text frame into feed events, in frame order.
///
/// Never fails as a whole: every element that cannot be decoded becomes a
/// `FeedEvent::Malformed` so the caller can log and drop it while keeping
/// the rest of the frame.
pub fn decode_frame(text: &str) -> Vec<FeedEvent> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => return vec![FeedEvent::Malformed(format!("invalid JSON: {e}"))],
    };

    match value {
        Value::Array(items) => items.into_iter().map(decode_tick).collect(),
        Value::Object(_) => vec![decode_object(value)],
        other => vec![FeedEvent::Malformed(format!(
            "unexpected top-level JSON value: {other}"
        ))],
    }
}

fn decode_object(value: Value) -> FeedEvent {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_owned);

    match kind.as_deref() {
        None | Some("tick") => decode_tick(value),
        Some("subscribed") => match serde_json::from_value::<SubscribedPayload>(value) {
            Ok(payload) => FeedEvent::Subscribed(payload.ids),
            Err(e) => FeedEvent::Malformed(format!("subscribed: {e}")),
        },
        Some("error") => {
            let message = serde_json::from_value::<ErrorPayload>(value)
                .ok()
                .and_then(|p| p.message)
                .unwrap_or_else(|| "unspecified".to_string());
            FeedEvent::ServerError(message)
        }
        Some(other) => FeedEvent::Ignored(other.to_string()),
    }
}

fn decode_tick(value: Value) -> FeedEvent {
    match serde_json::from_value::<Tick>(value) {
        Ok(tick) => FeedEvent::Tick(tick),
        Err(e) => FeedEvent::Malformed(e.to_string()),
    }
}
