//! Main application orchestration.

use crate::config::{AppConfig, RunMode};
use crate::error::AppResult;
use crate::simulator::SimulatedMarket;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use pulse_core::{now_ms, Category, ConnectionStatus, Instrument, Tick};
use pulse_feed::{Catalog, CatalogChange, ChangeKind, FlashTracker};
use pulse_source::{InstrumentSource, Loader, RestInstrumentSource, SourceResult};
use pulse_telemetry::Metrics;
use pulse_view::{ViewId, ViewRegistry, ViewState};
use pulse_ws::{ConnectionManager, TickSink, Transport, WsError, WsTransport};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Merges ticks into the catalog and counts every outcome.
struct MeteredSink {
    catalog: Arc<Catalog>,
}

impl TickSink for MeteredSink {
    fn accept(&self, tick: Tick) {
        let outcome = self.catalog.merge(&tick);
        Metrics::tick(outcome.as_str());
    }

    fn reject(&self, error: &WsError) {
        debug!(%error, "Dropped malformed payload");
        Metrics::tick("malformed");
    }
}

/// Counts bulk fetches per category and result.
struct MeteredSource {
    inner: Arc<dyn InstrumentSource>,
}

impl InstrumentSource for MeteredSource {
    fn fetch(&self, category: Category) -> BoxFuture<'static, SourceResult<Vec<Instrument>>> {
        self.inner
            .fetch(category)
            .map(move |result| {
                Metrics::load(category.as_str(), result.is_ok());
                result
            })
            .boxed()
    }
}

/// Main application.
pub struct Application {
    config: AppConfig,
    catalog: Arc<Catalog>,
    flash: Arc<FlashTracker>,
    views: Arc<ViewRegistry>,
    loader: Arc<Loader>,
    connection: Arc<ConnectionManager>,
    /// Column id and its view, in configured order.
    columns: Vec<(String, ViewId)>,
    tasks: Vec<JoinHandle<()>>,
}

impl Application {
    /// Create the application with the source and transport the mode selects.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let (source, transport): (Arc<dyn InstrumentSource>, Arc<dyn Transport>) = match config.mode
        {
            RunMode::Simulated => {
                let market = SimulatedMarket::new(config.simulator.clone());
                (Arc::new(market.clone()), Arc::new(market))
            }
            RunMode::Live => {
                let timeout = Duration::from_millis(config.loader.request_timeout_ms);
                let source = RestInstrumentSource::with_timeout(&config.loader.base_url, timeout)?;
                (Arc::new(source), Arc::new(WsTransport::new(&config.feed.ws_url)))
            }
        };
        Self::with_parts(config, source, transport)
    }

    /// Create the application around an explicit source and transport.
    pub fn with_parts(
        config: AppConfig,
        source: Arc<dyn InstrumentSource>,
        transport: Arc<dyn Transport>,
    ) -> AppResult<Self> {
        config.validate()?;

        let catalog = Arc::new(Catalog::new());
        let flash = Arc::new(FlashTracker::new(config.flash.window_ms));
        let views = Arc::new(ViewRegistry::new(catalog.clone()));

        let mut columns = Vec::with_capacity(config.columns.len());
        for column in &config.columns {
            let id = column.id.clone();
            let view = views.open(column.clone())?;
            debug!(column = %id, %view, category = %column.category, "Column opened");
            columns.push((id, view));
        }

        let source: Arc<dyn InstrumentSource> = Arc::new(MeteredSource { inner: source });
        let loader = Arc::new(Loader::new(
            source,
            catalog.clone(),
            config.loader.loader_config(),
        ));

        let sink = Arc::new(MeteredSink {
            catalog: catalog.clone(),
        });
        let connection = Arc::new(ConnectionManager::new(
            config.feed.connection_config(),
            transport,
            sink,
        ));

        Ok(Self {
            config,
            catalog,
            flash,
            views,
            loader,
            connection,
            columns,
            tasks: Vec::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.clone()
    }

    pub fn flash(&self) -> Arc<FlashTracker> {
        self.flash.clone()
    }

    pub fn views(&self) -> Arc<ViewRegistry> {
        self.views.clone()
    }

    pub fn connection(&self) -> Arc<ConnectionManager> {
        self.connection.clone()
    }

    /// View backing the column with `column_id`.
    pub fn view_for(&self, column_id: &str) -> Option<ViewId> {
        self.columns
            .iter()
            .find(|(id, _)| id == column_id)
            .map(|(_, view)| *view)
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(?e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        })
        .await
    }

    /// Run until `shutdown` completes.
    pub async fn run_until<F>(mut self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            mode = ?self.config.mode,
            columns = self.columns.len(),
            categories = ?self.config.loader.categories,
            "Starting application"
        );

        // Subscribe everything before the first load can publish.
        let mut changes = self.catalog.subscribe();
        let mut transitions = self.connection.subscribe_transitions();
        Metrics::connection_status(self.connection.status());

        self.tasks
            .push(tokio::spawn(self.flash.clone().run(self.catalog.subscribe())));
        self.tasks.push(tokio::spawn(
            self.flash
                .clone()
                .run_sweeper(Duration::from_millis(self.config.flash.sweep_interval_ms)),
        ));
        self.tasks
            .push(tokio::spawn(self.views.clone().run(self.catalog.subscribe())));
        self.tasks.push(tokio::spawn(self.loader.clone().run()));

        let summary_enabled = self.config.summary_interval_ms > 0;
        let mut summary =
            tokio::time::interval(Duration::from_millis(self.config.summary_interval_ms.max(1)));
        summary.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip the immediate first tick.
        summary.reset();

        let mut reconnect_reason: Option<&'static str> = None;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Ok(change) => self.on_catalog_change(&change),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Catalog notifications lagged, resyncing");
                        self.sync_subscription();
                    }
                    Err(RecvError::Closed) => break,
                },

                status = transitions.recv() => match status {
                    Ok(status) => Self::on_status(status, &mut reconnect_reason),
                    Err(RecvError::Lagged(_)) => Metrics::connection_status(self.connection.status()),
                    Err(RecvError::Closed) => break,
                },

                _ = summary.tick(), if summary_enabled => self.log_summary(),

                _ = &mut shutdown => break,
            }
        }

        self.shutdown();
        Ok(())
    }

    fn on_catalog_change(&self, change: &CatalogChange) {
        match change.kind {
            ChangeKind::Load => {
                for category in &change.categories {
                    let snapshot = self.catalog.category_snapshot(*category);
                    Metrics::catalog_size(category.as_str(), snapshot.instruments.len());
                }
                self.sync_subscription();
            }
            ChangeKind::Merge => {}
        }
        Metrics::view_recomputes(self.views.recompute_count());
        Metrics::flash_active(self.flash.len());
    }

    /// Stream ticks for every known instrument. No-op when the set is unchanged.
    fn sync_subscription(&self) {
        let ids = self.catalog.ids();
        if ids.is_empty() {
            return;
        }
        self.connection.start(ids);
    }

    fn on_status(status: ConnectionStatus, reconnect_reason: &mut Option<&'static str>) {
        info!(%status, "Connection status changed");
        Metrics::connection_status(status);

        match status {
            ConnectionStatus::Error => *reconnect_reason = Some("error"),
            ConnectionStatus::Disconnected => {
                reconnect_reason.get_or_insert("closed");
            }
            ConnectionStatus::Connecting => {
                if let Some(reason) = reconnect_reason.take() {
                    Metrics::ws_reconnect(reason);
                }
            }
            ConnectionStatus::Connected => *reconnect_reason = None,
        }
    }

    fn log_summary(&self) {
        let now = now_ms();
        let stats = self.catalog.stats();
        info!(
            status = %self.connection.status(),
            instruments = self.catalog.len(),
            applied = stats.applied,
            stale = stats.stale,
            unknown = stats.unknown,
            flashing = self.flash.active_ids(now).len(),
            recomputes = self.views.recompute_count(),
            "Feed summary"
        );

        for (column, view) in &self.columns {
            match self.views.project(*view) {
                Ok(ViewState::Loading) => info!(%column, "Column loading"),
                Ok(ViewState::Ready(projection)) => {
                    let rows = &projection.instruments;
                    let flashing = rows
                        .iter()
                        .filter(|row| self.flash.is_active(&row.id, now))
                        .count();
                    let top = rows
                        .iter()
                        .take(self.config.summary_rows)
                        .map(|row| format!("{}@{}", row.symbol, row.price))
                        .collect::<Vec<_>>()
                        .join(", ");
                    info!(%column, rows = rows.len(), flashing, %top, "Column summary");
                }
                Err(e) => warn!(%column, error = %e, "Column projection failed"),
            }
        }
        Metrics::view_recomputes(self.views.recompute_count());
        Metrics::flash_active(self.flash.len());
    }

    fn shutdown(&mut self) {
        info!("Shutting down");
        self.connection.stop();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        Metrics::connection_status(self.connection.status());
        self.log_summary();
    }
}
