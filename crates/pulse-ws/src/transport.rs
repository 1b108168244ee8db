//! Streaming transport seam.
//!
//! A `Transport` opens one session per connection attempt. The returned
//! future resolves once the handshake (and subscription) completed; the
//! session then yields `TransportEvent`s until the peer closes or fails.
//! Dropping a `Session` closes it.

use crate::error::{WsError, WsResult};
use crate::message::SubscribeRequest;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, SinkExt, StreamExt};
use pulse_core::{InstrumentId, Tick};
use tokio::sync::oneshot;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tracing::{debug, info};

/// Raw event produced by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Text frame to be decoded by the connection manager.
    Message(String),
    /// Already-decoded tick from an in-process transport.
    Tick(Tick),
    /// Ping or pong from the peer. Carries no payload but proves liveness.
    KeepAlive,
    /// Peer sent a close frame.
    Closed { code: u16, reason: String },
}

pub type EventStream = BoxStream<'static, WsResult<TransportEvent>>;

/// One open transport session.
pub struct Session {
    events: EventStream,
    closer: Option<oneshot::Sender<()>>,
}

impl Session {
    pub fn new(events: EventStream) -> Self {
        Self {
            events,
            closer: None,
        }
    }

    /// Attach a close signal, fired when the session is closed or dropped.
    pub fn with_closer(mut self, closer: oneshot::Sender<()>) -> Self {
        self.closer = Some(closer);
        self
    }

    pub fn events(&mut self) -> &mut EventStream {
        &mut self.events
    }

    pub fn close(mut self) {
        if let Some(closer) = self.closer.take() {
            let _ = closer.send(());
        }
    }
}

/// Opens streaming sessions for a set of instruments.
pub trait Transport: Send + Sync + 'static {
    fn connect(&self, ids: Vec<InstrumentId>) -> BoxFuture<'static, WsResult<Session>>;
}

/// JSON-over-WebSocket transport.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for WsTransport {
    fn connect(&self, ids: Vec<InstrumentId>) -> BoxFuture<'static, WsResult<Session>> {
        let url = self.url.clone();
        async move {
            info!(%url, count = ids.len(), "Connecting to tick stream");

            // TCP_NODELAY on: ticks are small and latency sensitive
            let (ws_stream, _response) =
                connect_async_tls_with_config(&url, None, true, None).await?;
            let (mut write, read) = ws_stream.split();

            let request = serde_json::to_string(&SubscribeRequest::new(&ids))?;
            write.send(Message::Text(request)).await?;
            debug!(count = ids.len(), "Subscribe request sent");

            let (close_tx, close_rx) = oneshot::channel::<()>();
            tokio::spawn(async move {
                // Resolves on explicit close and on session drop.
                let _ = close_rx.await;
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!(?e, "Close frame not sent");
                }
            });

            let events = read
                .filter_map(|msg| futures_util::future::ready(translate(msg)))
                .boxed();

            Ok(Session::new(events).with_closer(close_tx))
        }
        .boxed()
    }
}

fn translate(
    msg: Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<WsResult<TransportEvent>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(TransportEvent::Message(text))),
        Ok(Message::Binary(bytes)) => Some(Ok(TransportEvent::Message(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))),
        Ok(Message::Close(frame)) => {
            let (code, reason) = frame
                .map(|f| (f.code.into(), f.reason.to_string()))
                .unwrap_or((1000, "Normal close".to_string()));
            Some(Ok(TransportEvent::Closed { code, reason }))
        }
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => Some(Ok(TransportEvent::KeepAlive)),
        Ok(Message::Frame(_)) => None,
        Err(e) => Some(Err(WsError::from(e))),
    }
}
