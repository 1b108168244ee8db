//! Streaming connection manager.
//!
//! Owns the connection lifecycle for one set of instrument ids:
//! `disconnected -> connecting -> connected -> (error | closed) -> disconnected`,
//! followed by a single fixed-delay reconnect. Every decoded tick is handed to
//! the `TickSink` in transport order.

use crate::error::WsError;
use crate::message::{decode_frame, FeedEvent};
use crate::sink::TickSink;
use crate::transport::{Session, Transport, TransportEvent};
use futures_util::StreamExt;
use parking_lot::Mutex;
use pulse_core::{ConnectionStatus, InstrumentId};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Fixed delay before each reconnect attempt.
    pub reconnect_delay_ms: u64,
    /// An attempt that has not completed its handshake by then fails.
    pub connect_timeout_ms: u64,
    /// A connected stream silent for this long fails (0 = disabled).
    pub idle_timeout_ms: u64,
    /// Maximum consecutive failed attempts (0 = infinite).
    pub max_reconnect_attempts: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 3000,
            connect_timeout_ms: 10000,
            idle_timeout_ms: 30000,
            max_reconnect_attempts: 0, // Infinite
        }
    }
}

/// State shared between the manager handle and its session task.
struct Shared {
    config: ConnectionConfig,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn TickSink>,
    status_tx: watch::Sender<ConnectionStatus>,
    transitions_tx: broadcast::Sender<ConnectionStatus>,
    /// Bumped by every `start`/`stop`; a task only publishes for its own epoch.
    epoch: Mutex<u64>,
}

impl Shared {
    fn publish(&self, epoch: u64, status: ConnectionStatus) {
        let current = self.epoch.lock();
        if *current != epoch {
            return;
        }
        self.set_status(status);
    }

    fn set_status(&self, status: ConnectionStatus) {
        let changed = self.status_tx.send_if_modified(|s| {
            if *s == status {
                false
            } else {
                *s = status;
                true
            }
        });
        if changed {
            debug!(%status, "Connection status");
            let _ = self.transitions_tx.send(status);
        }
    }
}

struct Running {
    ids: BTreeSet<InstrumentId>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Streaming connection manager.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl ConnectionManager {
    pub fn new(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn TickSink>,
    ) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        let (transitions_tx, _) = broadcast::channel(64);
        Self {
            shared: Arc::new(Shared {
                config,
                transport,
                sink,
                status_tx,
                transitions_tx,
                epoch: Mutex::new(0),
            }),
            running: Mutex::new(None),
        }
    }

    /// Current status.
    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status_tx.borrow()
    }

    /// Latest-value status observer.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Every status transition, in order (lossy if the receiver lags).
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.shared.transitions_tx.subscribe()
    }

    /// Ids of the running session, if any.
    pub fn subscribed_ids(&self) -> Option<BTreeSet<InstrumentId>> {
        self.running.lock().as_ref().map(|r| r.ids.clone())
    }

    /// Start streaming ticks for `ids`.
    ///
    /// No-op while a live session for the same id set exists (connecting,
    /// connected or waiting to reconnect). A different id set replaces the
    /// running session. Must be called from within a tokio runtime.
    pub fn start<I>(&self, ids: I)
    where
        I: IntoIterator<Item = InstrumentId>,
    {
        let ids: BTreeSet<InstrumentId> = ids.into_iter().collect();
        let mut running = self.running.lock();

        if let Some(current) = running.as_ref() {
            if current.ids == ids && !current.handle.is_finished() {
                debug!(count = ids.len(), "Start ignored, session already live");
                return;
            }
            info!(
                old = current.ids.len(),
                new = ids.len(),
                "Replacing streaming session"
            );
            current.token.cancel();
        }

        let epoch = {
            let mut epoch = self.shared.epoch.lock();
            *epoch += 1;
            self.shared.set_status(ConnectionStatus::Connecting);
            *epoch
        };

        let token = CancellationToken::new();
        let task = SessionTask {
            shared: self.shared.clone(),
            ids: ids.iter().cloned().collect(),
            token: token.clone(),
            epoch,
        };
        let handle = tokio::spawn(task.run());

        info!(count = ids.len(), "Streaming session started");
        *running = Some(Running { ids, token, handle });
    }

    /// Stop streaming. Cancels any pending reconnect, closes the active
    /// connection and leaves the manager disconnected until the next `start`.
    pub fn stop(&self) {
        let running = self.running.lock().take();
        {
            let mut epoch = self.shared.epoch.lock();
            *epoch += 1;
            self.shared.set_status(ConnectionStatus::Disconnected);
        }
        if let Some(running) = running {
            running.token.cancel();
            info!("Streaming session stopped");
        }
    }

    /// Whether `stop` (or no `start` yet) left the manager idle.
    pub fn is_stopped(&self) -> bool {
        self.running.lock().is_none()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.token.cancel();
        }
    }
}

/// How one connection attempt ended.
enum SessionEnd {
    Cancelled,
    Closed,
    Failed(WsError),
}

struct SessionTask {
    shared: Arc<Shared>,
    ids: Vec<InstrumentId>,
    token: CancellationToken,
    epoch: u64,
}

impl SessionTask {
    async fn run(self) {
        let config = &self.shared.config;
        let delay = Duration::from_millis(config.reconnect_delay_ms);
        let mut attempt = 0u32;

        loop {
            if self.token.is_cancelled() {
                return;
            }
            self.publish(ConnectionStatus::Connecting);

            match self.connect_and_stream(&mut attempt).await {
                SessionEnd::Cancelled => {
                    debug!("Session cancelled");
                    return;
                }
                SessionEnd::Closed => {
                    info!("Tick stream closed");
                }
                SessionEnd::Failed(e) => {
                    warn!(error = %e, "Tick stream failed");
                    self.publish(ConnectionStatus::Error);
                }
            }

            attempt += 1;
            if config.max_reconnect_attempts > 0 && attempt >= config.max_reconnect_attempts {
                error!(
                    error = %WsError::RetriesExhausted(attempt),
                    "Giving up on tick stream"
                );
                self.publish(ConnectionStatus::Error);
                return;
            }

            self.publish(ConnectionStatus::Disconnected);
            warn!(attempt, delay_ms = config.reconnect_delay_ms, "Reconnecting");

            tokio::select! {
                biased;
                () = self.token.cancelled() => {
                    debug!("Cancelled during backoff");
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn connect_and_stream(&self, attempt: &mut u32) -> SessionEnd {
        let config = &self.shared.config;
        let connect = self.shared.transport.connect(self.ids.clone());
        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);

        let mut session = tokio::select! {
            biased;
            () = self.token.cancelled() => return SessionEnd::Cancelled,
            result = tokio::time::timeout(connect_timeout, connect) => match result {
                Err(_) => return SessionEnd::Failed(WsError::ConnectTimeout(config.connect_timeout_ms)),
                Ok(Err(e)) => return SessionEnd::Failed(e),
                Ok(Ok(session)) => session,
            },
        };

        *attempt = 0;
        self.publish(ConnectionStatus::Connected);
        info!(count = self.ids.len(), "Tick stream connected");

        loop {
            let next = tokio::select! {
                biased;
                () = self.token.cancelled() => None,
                next = next_event(&mut session, config.idle_timeout_ms) => Some(next),
            };
            let Some(next) = next else {
                session.close();
                return SessionEnd::Cancelled;
            };

            match next {
                Err(e) => return SessionEnd::Failed(e),
                Ok(None) => return SessionEnd::Closed,
                Ok(Some(TransportEvent::Closed { code, reason })) => {
                    info!(code, %reason, "Peer closed tick stream");
                    return SessionEnd::Closed;
                }
                Ok(Some(TransportEvent::Tick(tick))) => self.shared.sink.accept(tick),
                Ok(Some(TransportEvent::Message(text))) => self.handle_text(&text),
                Ok(Some(TransportEvent::KeepAlive)) => trace!("Keep-alive frame"),
            }
        }
    }

    fn handle_text(&self, text: &str) {
        for event in decode_frame(text) {
            match event {
                FeedEvent::Tick(tick) => self.shared.sink.accept(tick),
                FeedEvent::Malformed(reason) => {
                    let e = WsError::MalformedTick(reason);
                    warn!(error = %e, "Dropping payload");
                    self.shared.sink.reject(&e);
                }
                FeedEvent::Subscribed(ids) => {
                    debug!(count = ids.len(), "Subscription acknowledged");
                }
                FeedEvent::ServerError(message) => {
                    warn!(%message, "Server reported error");
                }
                FeedEvent::Ignored(kind) => {
                    debug!(%kind, "Ignoring message");
                }
            }
        }
    }

    fn publish(&self, status: ConnectionStatus) {
        self.shared.publish(self.epoch, status);
    }
}

/// Next event of a session, failing with `IdleTimeout` when the stream stays
/// silent for `idle_timeout_ms` (0 waits forever).
async fn next_event(
    session: &mut Session,
    idle_timeout_ms: u64,
) -> Result<Option<TransportEvent>, WsError> {
    let next = if idle_timeout_ms == 0 {
        session.events().next().await
    } else {
        tokio::time::timeout(
            Duration::from_millis(idle_timeout_ms),
            session.events().next(),
        )
        .await
        .map_err(|_| WsError::IdleTimeout(idle_timeout_ms))?
    };
    next.transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WsResult;
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use pulse_core::{Price, Tick};
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    type EventTx = mpsc::UnboundedSender<WsResult<TransportEvent>>;

    enum Plan {
        Refuse,
        Hang,
        Open(mpsc::UnboundedReceiver<WsResult<TransportEvent>>),
    }

    #[derive(Default)]
    struct MockTransport {
        plans: parking_lot::Mutex<VecDeque<Plan>>,
        attempts: AtomicUsize,
        requested: parking_lot::Mutex<Vec<Vec<InstrumentId>>>,
    }

    impl MockTransport {
        fn with_plans(plans: Vec<Plan>) -> Arc<Self> {
            Arc::new(Self {
                plans: parking_lot::Mutex::new(plans.into()),
                ..Default::default()
            })
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    impl Transport for MockTransport {
        fn connect(&self, ids: Vec<InstrumentId>) -> BoxFuture<'static, WsResult<Session>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().push(ids);
            let plan = self.plans.lock().pop_front().unwrap_or(Plan::Refuse);
            async move {
                match plan {
                    Plan::Refuse => Err(WsError::ConnectionFailed("refused".to_string())),
                    Plan::Hang => futures_util::future::pending().await,
                    Plan::Open(rx) => {
                        let events = futures_util::stream::unfold(rx, |mut rx| async move {
                            rx.recv().await.map(|event| (event, rx))
                        })
                        .boxed();
                        Ok(Session::new(events))
                    }
                }
            }
            .boxed()
        }
    }

    fn open() -> (Plan, EventTx) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Plan::Open(rx), tx)
    }

    fn ids(raw: &[&str]) -> Vec<InstrumentId> {
        raw.iter().map(|s| InstrumentId::new(*s)).collect()
    }

    fn tick_json(id: &str, price: &str, timestamp: i64) -> String {
        format!(
            r#"{{"type":"tick","instrumentId":"{id}","price":"{price}","priceChange":"0","priceChangePercent":"0","timestamp":{timestamp}}}"#
        )
    }

    fn manager(
        transport: Arc<MockTransport>,
        config: ConnectionConfig,
    ) -> (ConnectionManager, mpsc::UnboundedReceiver<Tick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionManager::new(config, transport, Arc::new(tx)), rx)
    }

    async fn wait_for(
        transitions: &mut broadcast::Receiver<ConnectionStatus>,
        wanted: ConnectionStatus,
    ) {
        loop {
            let status = transitions.recv().await.expect("transition");
            if status == wanted {
                return;
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.reconnect_delay_ms, 3000);
        assert_eq!(config.connect_timeout_ms, 10000);
        assert_eq!(config.idle_timeout_ms, 30000);
        assert_eq!(config.max_reconnect_attempts, 0); // Infinite
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_connects_and_forwards_ticks_in_order() {
        let (plan, events) = open();
        let transport = MockTransport::with_plans(vec![plan]);
        let (manager, mut ticks) = manager(transport.clone(), ConnectionConfig::default());
        let mut transitions = manager.subscribe_transitions();

        manager.start(ids(&["a", "b"]));
        assert_eq!(manager.status(), ConnectionStatus::Connecting);
        wait_for(&mut transitions, ConnectionStatus::Connected).await;

        events
            .send(Ok(TransportEvent::Message(tick_json("a", "10", 1))))
            .unwrap();
        events
            .send(Ok(TransportEvent::Message(tick_json("b", "20", 2))))
            .unwrap();

        let first = ticks.recv().await.unwrap();
        let second = ticks.recv().await.unwrap();
        assert_eq!(first.instrument_id.as_str(), "a");
        assert_eq!(second.price, Price::new(dec!(20)));
        assert_eq!(manager.status(), ConnectionStatus::Connected);
        assert_eq!(transport.requested.lock()[0], ids(&["a", "b"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_publishes_error_then_disconnected_then_reconnects_after_backoff() {
        let (plan, _events) = open();
        let transport = MockTransport::with_plans(vec![Plan::Refuse, plan]);
        let (manager, _ticks) = manager(transport.clone(), ConnectionConfig::default());
        let mut transitions = manager.subscribe_transitions();

        manager.start(ids(&["a"]));
        assert_eq!(transitions.recv().await.unwrap(), ConnectionStatus::Connecting);
        assert_eq!(transitions.recv().await.unwrap(), ConnectionStatus::Error);
        assert_eq!(transitions.recv().await.unwrap(), ConnectionStatus::Disconnected);
        let closed_at = Instant::now();

        assert_eq!(transitions.recv().await.unwrap(), ConnectionStatus::Connecting);
        assert!(closed_at.elapsed() >= Duration::from_millis(3000));
        assert!(closed_at.elapsed() < Duration::from_millis(3100));

        assert_eq!(transitions.recv().await.unwrap(), ConnectionStatus::Connected);
        assert_eq!(transport.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_close_reconnects_with_same_ids() {
        let (first, events) = open();
        let (second, _events2) = open();
        let transport = MockTransport::with_plans(vec![first, second]);
        let (manager, _ticks) = manager(transport.clone(), ConnectionConfig::default());
        let mut transitions = manager.subscribe_transitions();

        manager.start(ids(&["x", "y"]));
        wait_for(&mut transitions, ConnectionStatus::Connected).await;

        events
            .send(Ok(TransportEvent::Closed {
                code: 1000,
                reason: "done".to_string(),
            }))
            .unwrap();

        assert_eq!(transitions.recv().await.unwrap(), ConnectionStatus::Disconnected);
        wait_for(&mut transitions, ConnectionStatus::Connected).await;

        let requested = transport.requested.lock();
        assert_eq!(requested.len(), 2);
        assert_eq!(requested[0], requested[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_pending_reconnect_prevents_further_attempts() {
        let transport = MockTransport::with_plans(vec![Plan::Refuse]);
        let (manager, _ticks) = manager(transport.clone(), ConnectionConfig::default());
        let mut transitions = manager.subscribe_transitions();

        manager.start(ids(&["a"]));
        wait_for(&mut transitions, ConnectionStatus::Disconnected).await;

        manager.stop();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(transport.attempts(), 1);
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
        assert!(manager.is_stopped());
        while let Ok(status) = transitions.try_recv() {
            assert_ne!(status, ConnectionStatus::Connecting);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_closes_active_connection_and_is_idempotent() {
        let (plan, events) = open();
        let transport = MockTransport::with_plans(vec![plan]);
        let (manager, _ticks) = manager(transport.clone(), ConnectionConfig::default());
        let mut transitions = manager.subscribe_transitions();

        manager.start(ids(&["a"]));
        wait_for(&mut transitions, ConnectionStatus::Connected).await;

        manager.stop();
        manager.stop();
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);

        // The session task drops its event stream once cancelled.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(events.is_closed());
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent_for_equal_id_sets() {
        let (plan, _events) = open();
        let transport = MockTransport::with_plans(vec![plan]);
        let (manager, _ticks) = manager(transport.clone(), ConnectionConfig::default());
        let mut transitions = manager.subscribe_transitions();

        manager.start(ids(&["a", "b"]));
        manager.start(ids(&["b", "a"]));
        wait_for(&mut transitions, ConnectionStatus::Connected).await;
        manager.start(ids(&["a", "b", "a"]));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.attempts(), 1);
        assert_eq!(manager.status(), ConnectionStatus::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_id_set_replaces_session() {
        let (first, first_events) = open();
        let (second, _second_events) = open();
        let transport = MockTransport::with_plans(vec![first, second]);
        let (manager, _ticks) = manager(transport.clone(), ConnectionConfig::default());
        let mut transitions = manager.subscribe_transitions();

        manager.start(ids(&["a"]));
        wait_for(&mut transitions, ConnectionStatus::Connected).await;

        manager.start(ids(&["a", "b"]));
        wait_for(&mut transitions, ConnectionStatus::Connected).await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.attempts(), 2);
        assert!(first_events.is_closed());
        assert_eq!(transport.requested.lock()[1], ids(&["a", "b"]));
        assert_eq!(manager.subscribed_ids().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_payload_is_dropped_without_disconnect() {
        struct Recording {
            accepted: parking_lot::Mutex<Vec<Tick>>,
            rejected: AtomicUsize,
        }

        impl TickSink for Recording {
            fn accept(&self, tick: Tick) {
                self.accepted.lock().push(tick);
            }

            fn reject(&self, error: &WsError) {
                assert!(error.is_payload_error());
                self.rejected.fetch_add(1, Ordering::SeqCst);
            }
        }

        let sink = Arc::new(Recording {
            accepted: parking_lot::Mutex::new(Vec::new()),
            rejected: AtomicUsize::new(0),
        });
        let (plan, events) = open();
        let transport = MockTransport::with_plans(vec![plan]);
        let manager =
            ConnectionManager::new(ConnectionConfig::default(), transport.clone(), sink.clone());
        let mut transitions = manager.subscribe_transitions();

        manager.start(ids(&["a"]));
        wait_for(&mut transitions, ConnectionStatus::Connected).await;

        events
            .send(Ok(TransportEvent::Message("{not json".to_string())))
            .unwrap();
        events
            .send(Ok(TransportEvent::Message(
                r#"{"type":"tick","instrumentId":"a","price":"5"}"#.to_string(),
            )))
            .unwrap();
        events
            .send(Ok(TransportEvent::Message(tick_json("a", "7", 3))))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sink.rejected.load(Ordering::SeqCst), 2);
        assert_eq!(sink.accepted.lock().len(), 1);
        assert_eq!(manager.status(), ConnectionStatus::Connected);
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_watchdog_fails_hung_attempt() {
        let transport = MockTransport::with_plans(vec![Plan::Hang]);
        let (manager, _ticks) = manager(transport.clone(), ConnectionConfig::default());
        let mut transitions = manager.subscribe_transitions();

        let started = Instant::now();
        manager.start(ids(&["a"]));
        wait_for(&mut transitions, ConnectionStatus::Error).await;

        assert!(started.elapsed() >= Duration::from_millis(10000));
        manager.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_watchdog_fails_silent_stream() {
        let (plan, _events) = open();
        let transport = MockTransport::with_plans(vec![plan]);
        let config = ConnectionConfig {
            idle_timeout_ms: 5000,
            ..Default::default()
        };
        let (manager, _ticks) = manager(transport.clone(), config);
        let mut transitions = manager.subscribe_transitions();

        manager.start(ids(&["a"]));
        wait_for(&mut transitions, ConnectionStatus::Connected).await;
        let connected_at = Instant::now();

        wait_for(&mut transitions, ConnectionStatus::Error).await;
        assert!(connected_at.elapsed() >= Duration::from_millis(5000));
        manager.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_restarts_idle_watchdog() {
        let (plan, events) = open();
        let transport = MockTransport::with_plans(vec![plan]);
        let config = ConnectionConfig {
            idle_timeout_ms: 5000,
            ..Default::default()
        };
        let (manager, mut ticks) = manager(transport.clone(), config);
        let mut transitions = manager.subscribe_transitions();

        manager.start(ids(&["a"]));
        wait_for(&mut transitions, ConnectionStatus::Connected).await;

        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(2000)).await;
            events.send(Ok(TransportEvent::KeepAlive)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(manager.status(), ConnectionStatus::Connected);
        assert!(transitions.try_recv().is_err());
        assert!(ticks.try_recv().is_err());
        assert_eq!(transport.attempts(), 1);
        manager.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_reconnect_attempts_leaves_error_status() {
        let transport = MockTransport::with_plans(vec![]);
        let config = ConnectionConfig {
            max_reconnect_attempts: 3,
            ..Default::default()
        };
        let (manager, _ticks) = manager(transport.clone(), config);

        manager.start(ids(&["a"]));
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(transport.attempts(), 3);
        assert_eq!(manager.status(), ConnectionStatus::Error);

        // A fresh start is allowed once the session gave up.
        manager.start(ids(&["a"]));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.attempts(), 4);
        manager.stop();
    }
}
