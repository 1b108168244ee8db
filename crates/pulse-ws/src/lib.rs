//! Tick ingestion channel.
//!
//! Provides a resilient streaming connection with:
//! - Fixed-delay reconnection, cancellable at any point
//! - Connect and idle watchdogs
//! - Boundary validation of every downstream payload
//! - Pluggable transports (`WsTransport` for JSON over WebSocket)

pub mod connection;
pub mod error;
pub mod message;
pub mod sink;
pub mod transport;

pub use connection::{ConnectionConfig, ConnectionManager};
pub use error::{WsError, WsResult};
pub use message::{decode_frame, FeedEvent, SubscribeRequest};
pub use sink::TickSink;
pub use transport::{EventStream, Session, Transport, TransportEvent, WsTransport};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
