//! Refetch policy for bulk loads.
//!
//! Every `refetch_interval_ms` each configured category is fetched and
//! upserted into the catalog. A fetch is skipped while the last successful
//! one for that category is younger than `stale_time_ms`.

use crate::error::SourceResult;
use crate::source::InstrumentSource;
use parking_lot::Mutex;
use pulse_core::Category;
use pulse_feed::{Catalog, LoadOutcome};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub categories: Vec<Category>,
    pub refetch_interval_ms: u64,
    pub stale_time_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            categories: Category::ALL.to_vec(),
            refetch_interval_ms: 60000,
            stale_time_ms: 30000,
        }
    }
}

pub struct Loader {
    source: Arc<dyn InstrumentSource>,
    catalog: Arc<Catalog>,
    config: LoaderConfig,
    last_success: Mutex<HashMap<Category, Instant>>,
}

impl Loader {
    pub fn new(
        source: Arc<dyn InstrumentSource>,
        catalog: Arc<Catalog>,
        config: LoaderConfig,
    ) -> Self {
        Self {
            source,
            catalog,
            config,
            last_success: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Whether the last successful fetch of `category` is still fresh.
    pub fn is_fresh(&self, category: Category) -> bool {
        let stale_time = Duration::from_millis(self.config.stale_time_ms);
        self.last_success
            .lock()
            .get(&category)
            .is_some_and(|at| at.elapsed() < stale_time)
    }

    /// Fetch and load one category. Returns `None` when skipped as fresh.
    pub async fn refresh(&self, category: Category, force: bool) -> SourceResult<Option<LoadOutcome>> {
        if !force && self.is_fresh(category) {
            debug!(%category, "Skipping fetch, data still fresh");
            return Ok(None);
        }

        let instruments = self.source.fetch(category).await?;
        let outcome = self.catalog.load(category, instruments);
        self.last_success.lock().insert(category, Instant::now());
        Ok(Some(outcome))
    }

    /// Refresh every configured category. Failures are logged and leave the
    /// category's catalog state untouched. Returns how many categories loaded.
    pub async fn refresh_all(&self, force: bool) -> usize {
        let mut loaded = 0;
        for category in self.config.categories.iter().copied() {
            match self.refresh(category, force).await {
                Ok(Some(_)) => loaded += 1,
                Ok(None) => {}
                Err(e) => warn!(%category, error = %e, "Instrument fetch failed"),
            }
        }
        loaded
    }

    /// Initial load, then a refresh every `refetch_interval_ms`.
    /// Runs until the task is aborted.
    pub async fn run(self: Arc<Self>) {
        let period = Duration::from_millis(self.config.refetch_interval_ms.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        // The first tick completes immediately.
        ticker.tick().await;
        self.refresh_all(true).await;

        loop {
            ticker.tick().await;
            self.refresh_all(false).await;
        }
    }
}
