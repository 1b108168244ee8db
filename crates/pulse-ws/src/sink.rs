//! Destination for decoded ticks.

use crate::error::WsError;
use pulse_core::Tick;
use tokio::sync::mpsc;
use tracing::warn;

/// Receives ticks in transport order, one at a time.
///
/// Called from the ingestion task, so implementations must not block on
/// anything slower than an in-memory write.
pub trait TickSink: Send + Sync + 'static {
    fn accept(&self, tick: Tick);

    /// A payload was rejected at the boundary and dropped.
    fn reject(&self, error: &WsError) {
        let _ = error;
    }
}

impl TickSink for mpsc::UnboundedSender<Tick> {
    fn accept(&self, tick: Tick) {
        if self.send(tick).is_err() {
            warn!("Tick receiver dropped");
        }
    }
}
