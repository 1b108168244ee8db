//! Transient "recently updated" markers.
//!
//! A marker is set for every instrument a merge touched and expires after a
//! fixed window. Expired markers are dropped lazily on read and eagerly by
//! `sweep`. Re-recording an active marker moves its expiry forward.

use crate::catalog::{CatalogChange, ChangeKind};
use dashmap::DashMap;
use pulse_core::{now_ms, InstrumentId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub const DEFAULT_FLASH_WINDOW_MS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashMarker {
    pub changed_at: i64,
    pub expires_at: i64,
}

pub struct FlashTracker {
    window_ms: i64,
    markers: DashMap<InstrumentId, FlashMarker>,
}

impl FlashTracker {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms: i64::try_from(window_ms).unwrap_or(i64::MAX),
            markers: DashMap::new(),
        }
    }

    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    /// Set or overwrite the marker for `id`.
    pub fn record(&self, id: InstrumentId, timestamp: i64) {
        self.markers.insert(
            id,
            FlashMarker {
                changed_at: timestamp,
                expires_at: timestamp.saturating_add(self.window_ms),
            },
        );
    }

    /// True iff `id` has a marker and `now < expires_at`.
    pub fn is_active(&self, id: &InstrumentId, now: i64) -> bool {
        let active = match self.markers.get(id) {
            None => return false,
            Some(marker) => now < marker.expires_at,
        };
        if !active {
            self.markers.remove_if(id, |_, marker| now >= marker.expires_at);
        }
        active
    }

    pub fn marker(&self, id: &InstrumentId) -> Option<FlashMarker> {
        self.markers.get(id).map(|m| *m)
    }

    /// Ids with an active marker at `now`. Expired markers are removed.
    pub fn active_ids(&self, now: i64) -> Vec<InstrumentId> {
        self.sweep(now);
        let mut ids: Vec<InstrumentId> = self.markers.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Remove every marker expired at `now`. Returns how many were removed.
    pub fn sweep(&self, now: i64) -> usize {
        let before = self.markers.len();
        self.markers.retain(|_, marker| now < marker.expires_at);
        before.saturating_sub(self.markers.len())
    }

    /// Number of markers, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Record every id touched by a merge.
    pub fn on_catalog_change(&self, change: &CatalogChange) {
        if change.kind != ChangeKind::Merge {
            return;
        }
        for id in &change.ids {
            self.record(id.clone(), change.at);
        }
    }

    /// Consume catalog changes until the catalog goes away.
    pub async fn run(self: Arc<Self>, mut rx: broadcast::Receiver<CatalogChange>) {
        loop {
            match rx.recv().await {
                Ok(change) => self.on_catalog_change(&change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Flash tracker lagged behind catalog changes");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Catalog change channel closed");
                    return;
                }
            }
        }
    }

    /// Periodically sweep expired markers. Runs until the task is aborted.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = self.sweep(now_ms());
            if removed > 0 {
                debug!(removed, remaining = self.len(), "Swept flash markers");
            }
        }
    }
}

impl Default for FlashTracker {
    fn default() -> Self {
        Self::new(DEFAULT_FLASH_WINDOW_MS)
    }
}
