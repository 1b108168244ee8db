//! Memoizing registry of open views.
//!
//! Each view caches its last projection keyed by (category version, config
//! generation) and is recomputed only when one of the two moved. Subscribers
//! get a `watch` channel that only changes when the projection does.

use crate::error::{ViewError, ViewResult};
use crate::projector::project;
use parking_lot::RwLock;
use pulse_core::{Category, ColumnConfig, FilterPatch, Instrument, SortKey, ViewConfig};
use pulse_feed::{Catalog, CatalogChange};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(u64);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view-{}", self.0)
    }
}

/// One computed projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub category: Category,
    pub category_version: u64,
    pub generation: u64,
    pub instruments: Arc<Vec<Instrument>>,
}

/// What a view currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    /// The category has not been loaded yet.
    Loading,
    /// Loaded; the projection may be empty.
    Ready(Projection),
}

impl ViewState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn instruments(&self) -> &[Instrument] {
        match self {
            Self::Loading => &[],
            Self::Ready(projection) => projection.instruments.as_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.instruments().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MemoKey {
    category_version: u64,
    loaded: bool,
    generation: u64,
}

struct ViewEntry {
    column: ColumnConfig,
    generation: u64,
    memo: Option<(MemoKey, ViewState)>,
    tx: watch::Sender<ViewState>,
}

pub struct ViewRegistry {
    catalog: Arc<Catalog>,
    views: RwLock<BTreeMap<ViewId, ViewEntry>>,
    next_id: AtomicU64,
    recomputes: AtomicU64,
    memo_hits: AtomicU64,
}

impl ViewRegistry {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            views: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            recomputes: AtomicU64::new(0),
            memo_hits: AtomicU64::new(0),
        }
    }

    /// Open a view for `column`. Fails fast on an invalid configuration.
    pub fn open(&self, column: ColumnConfig) -> ViewResult<ViewId> {
        column.validate()?;

        let id = ViewId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, _) = watch::channel(ViewState::Loading);
        info!(
            view = %id,
            column = %column.id,
            category = %column.category,
            sort_by = %column.view.sort_by,
            "View opened"
        );
        self.views.write().insert(
            id,
            ViewEntry {
                column,
                generation: 0,
                memo: None,
                tx,
            },
        );
        self.refresh(id)?;
        Ok(id)
    }

    pub fn close(&self, view: ViewId) -> bool {
        self.views.write().remove(&view).is_some()
    }

    pub fn view_ids(&self) -> Vec<ViewId> {
        self.views.read().keys().copied().collect()
    }

    pub fn column(&self, view: ViewId) -> ViewResult<ColumnConfig> {
        self.views
            .read()
            .get(&view)
            .map(|entry| entry.column.clone())
            .ok_or(ViewError::UnknownView(view))
    }

    /// Replace the sort/filter configuration of a view.
    pub fn reconfigure(&self, view: ViewId, config: ViewConfig) -> ViewResult<()> {
        config.validate()?;
        self.update_config(view, |current| {
            *current = config;
            Ok(())
        })?;
        Ok(())
    }

    /// Column-header click: see `ViewConfig::toggle_sort`.
    pub fn toggle_sort(&self, view: ViewId, key: SortKey) -> ViewResult<ViewConfig> {
        self.update_config(view, |current| {
            current.toggle_sort(key);
            Ok(())
        })
    }

    /// Merge a partial filter update. The view is left untouched if the
    /// merged filter is invalid.
    pub fn patch_filter(&self, view: ViewId, patch: &FilterPatch) -> ViewResult<ViewConfig> {
        self.update_config(view, |current| {
            current.filter.apply_patch(patch);
            current.validate()?;
            Ok(())
        })
    }

    /// Apply `f` to a copy of the view's config under the write lock. The
    /// copy replaces the config only if `f` succeeds.
    fn update_config<F>(&self, view: ViewId, f: F) -> ViewResult<ViewConfig>
    where
        F: FnOnce(&mut ViewConfig) -> ViewResult<()>,
    {
        let config = {
            let mut views = self.views.write();
            let entry = views.get_mut(&view).ok_or(ViewError::UnknownView(view))?;
            let mut next = entry.column.view.clone();
            f(&mut next)?;
            if next != entry.column.view {
                entry.column.view = next;
                entry.generation += 1;
                debug!(view = %view, generation = entry.generation, "View reconfigured");
            }
            entry.column.view.clone()
        };
        self.refresh(view)?;
        Ok(config)
    }

    /// Current state of a view, recomputed only if stale.
    pub fn project(&self, view: ViewId) -> ViewResult<ViewState> {
        self.refresh(view)
    }

    pub fn subscribe(&self, view: ViewId) -> ViewResult<watch::Receiver<ViewState>> {
        self.views
            .read()
            .get(&view)
            .map(|entry| entry.tx.subscribe())
            .ok_or(ViewError::UnknownView(view))
    }

    /// Refresh every view whose category the change touched.
    /// Returns the number of views that were recomputed.
    pub fn on_catalog_change(&self, change: &CatalogChange) -> usize {
        let affected: Vec<ViewId> = self
            .views
            .read()
            .iter()
            .filter(|(_, entry)| change.touches(entry.column.category))
            .map(|(id, _)| *id)
            .collect();

        let before = self.recompute_count();
        for view in affected {
            // A view closed concurrently is simply skipped.
            let _ = self.refresh(view);
        }
        (self.recompute_count() - before) as usize
    }

    fn refresh_all(&self) {
        for view in self.view_ids() {
            let _ = self.refresh(view);
        }
    }

    /// Drive view updates from catalog changes until the catalog goes away.
    pub async fn run(self: Arc<Self>, mut rx: broadcast::Receiver<CatalogChange>) {
        loop {
            match rx.recv().await {
                Ok(change) => {
                    self.on_catalog_change(&change);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "View registry lagged, refreshing all views");
                    self.refresh_all();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Catalog change channel closed");
                    return;
                }
            }
        }
    }

    /// Number of projections computed so far.
    pub fn recompute_count(&self) -> u64 {
        self.recomputes.load(Ordering::Relaxed)
    }

    /// Number of `project`/refresh calls served from the memo.
    pub fn memo_hit_count(&self) -> u64 {
        self.memo_hits.load(Ordering::Relaxed)
    }

    fn refresh(&self, view: ViewId) -> ViewResult<ViewState> {
        let (category, config, generation) = {
            let views = self.views.read();
            let entry = views.get(&view).ok_or(ViewError::UnknownView(view))?;
            let key = MemoKey {
                category_version: self.catalog.category_version(entry.column.category),
                loaded: self.catalog.is_loaded(entry.column.category),
                generation: entry.generation,
            };
            if let Some((memo_key, state)) = &entry.memo {
                if *memo_key == key {
                    self.memo_hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(state.clone());
                }
            }
            (
                entry.column.category,
                entry.column.view.clone(),
                entry.generation,
            )
        };

        // Compute outside the registry lock; the snapshot is consistent.
        let snapshot = self.catalog.category_snapshot(category);
        let key = MemoKey {
            category_version: snapshot.version,
            loaded: snapshot.loaded,
            generation,
        };
        let state = if snapshot.loaded {
            ViewState::Ready(Projection {
                category,
                category_version: snapshot.version,
                generation,
                instruments: Arc::new(project(&snapshot.instruments, category, &config)),
            })
        } else {
            ViewState::Loading
        };
        self.recomputes.fetch_add(1, Ordering::Relaxed);

        let mut views = self.views.write();
        let entry = views.get_mut(&view).ok_or(ViewError::UnknownView(view))?;
        if entry.generation != generation {
            // Reconfigured meanwhile; that call refreshes with the new config.
            return Ok(state);
        }
        let newer = entry
            .memo
            .as_ref()
            .map_or(true, |(memo_key, _)| memo_key.category_version <= key.category_version);
        if newer {
            entry.memo = Some((key, state.clone()));
            let published = state.clone();
            entry.tx.send_if_modified(|current| {
                if *current == published {
                    false
                } else {
                    *current = published;
                    true
                }
            });
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::{
        InstrumentId, Phase, PhaseFilter, Price, SortDirection, Tick, ViewFilter,
    };
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn instrument(category: Category, n: u32, price: Decimal) -> Instrument {
        Instrument {
            id: InstrumentId::new(format!("{category}-{n}")),
            symbol: format!("T{n}"),
            name: format!("Token {n}"),
            price: Price::new(price),
            price_change_24h: dec!(0),
            price_change_percent_24h: dec!(0),
            volume_24h: dec!(1000),
            market_cap: dec!(5000),
            liquidity: dec!(0),
            phase: Some(Phase::P1),
            category,
            created_at: 1,
            updated_at: 1,
        }
    }

    fn column(category: Category, sort_by: SortKey, direction: SortDirection) -> ColumnConfig {
        ColumnConfig::new(category.as_str(), category, ViewConfig::new(sort_by, direction))
    }

    fn prices(state: &ViewState) -> Vec<Price> {
        state.instruments().iter().map(|i| i.price).collect()
    }

    fn setup() -> (Arc<Catalog>, ViewRegistry) {
        let catalog = Arc::new(Catalog::new());
        let registry = ViewRegistry::new(catalog.clone());
        (catalog, registry)
    }

    #[test]
    fn test_loading_is_distinct_from_empty() {
        let (catalog, registry) = setup();
        let view = registry
            .open(column(Category::Migrated, SortKey::Default, SortDirection::Desc))
            .unwrap();

        assert_eq!(registry.project(view).unwrap(), ViewState::Loading);

        catalog.load(Category::Migrated, Vec::new());
        let state = registry.project(view).unwrap();
        assert!(!state.is_loading());
        assert!(state.is_empty());
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let (_catalog, registry) = setup();
        let mut col = column(Category::NewPairs, SortKey::Price, SortDirection::Asc);
        col.view.filter.min_price = Some(Price::new(dec!(10)));
        col.view.filter.max_price = Some(Price::new(dec!(5)));

        assert!(matches!(registry.open(col), Err(ViewError::InvalidConfig(_))));
        assert!(registry.view_ids().is_empty());
    }

    #[test]
    fn test_memoization_recomputes_only_on_relevant_change() {
        let (catalog, registry) = setup();
        catalog.load(
            Category::NewPairs,
            vec![instrument(Category::NewPairs, 0, dec!(30)), instrument(Category::NewPairs, 1, dec!(10))],
        );
        catalog.load(Category::Migrated, vec![instrument(Category::Migrated, 0, dec!(1))]);

        let view = registry
            .open(column(Category::NewPairs, SortKey::Price, SortDirection::Asc))
            .unwrap();
        let computed = registry.recompute_count();

        registry.project(view).unwrap();
        registry.project(view).unwrap();
        assert_eq!(registry.recompute_count(), computed);

        // Another category moving does not invalidate this view.
        catalog.merge(&Tick::new("migrated-0", Price::new(dec!(2)), dec!(1), dec!(1), 5).unwrap());
        registry.project(view).unwrap();
        assert_eq!(registry.recompute_count(), computed);

        catalog.merge(&Tick::new("new-pairs-0", Price::new(dec!(5)), dec!(1), dec!(1), 5).unwrap());
        let state = registry.project(view).unwrap();
        assert_eq!(registry.recompute_count(), computed + 1);
        assert_eq!(prices(&state), vec![Price::new(dec!(5)), Price::new(dec!(10))]);

        registry.toggle_sort(view, SortKey::Price).unwrap();
        assert_eq!(registry.recompute_count(), computed + 2);
    }

    #[test]
    fn test_views_are_independent() {
        let (catalog, registry) = setup();
        catalog.load(
            Category::NewPairs,
            vec![
                instrument(Category::NewPairs, 0, dec!(30)),
                instrument(Category::NewPairs, 1, dec!(10)),
                instrument(Category::NewPairs, 2, dec!(20)),
            ],
        );

        let asc = registry
            .open(column(Category::NewPairs, SortKey::Price, SortDirection::Asc))
            .unwrap();
        let desc = registry
            .open(column(Category::NewPairs, SortKey::Price, SortDirection::Desc))
            .unwrap();

        assert_eq!(
            prices(&registry.project(asc).unwrap()),
            vec![Price::new(dec!(10)), Price::new(dec!(20)), Price::new(dec!(30))]
        );
        assert_eq!(
            prices(&registry.project(desc).unwrap()),
            vec![Price::new(dec!(30)), Price::new(dec!(20)), Price::new(dec!(10))]
        );
    }

    #[test]
    fn test_toggle_and_patch_filter() {
        let (catalog, registry) = setup();
        let mut second = instrument(Category::NewPairs, 1, dec!(10));
        second.phase = Some(Phase::P2);
        catalog.load(
            Category::NewPairs,
            vec![instrument(Category::NewPairs, 0, dec!(30)), second],
        );
        let view = registry
            .open(column(Category::NewPairs, SortKey::Default, SortDirection::Desc))
            .unwrap();

        let config = registry.toggle_sort(view, SortKey::Volume).unwrap();
        assert_eq!((config.sort_by, config.direction), (SortKey::Volume, SortDirection::Desc));
        let config = registry.toggle_sort(view, SortKey::Volume).unwrap();
        assert_eq!(config.direction, SortDirection::Asc);

        registry
            .patch_filter(
                view,
                &FilterPatch {
                    phase: Some(PhaseFilter::Only(Phase::P2)),
                    ..Default::default()
                },
            )
            .unwrap();
        let state = registry.project(view).unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.instruments()[0].id.as_str(), "new-pairs-1");

        let bad = FilterPatch {
            min_price: Some(Some(Price::new(dec!(-1)))),
            ..Default::default()
        };
        assert!(registry.patch_filter(view, &bad).is_err());
        assert_eq!(registry.column(view).unwrap().view.filter.min_price, None);
    }

    #[test]
    fn test_patch_filter_keeps_concurrent_sort_changes() {
        let (_catalog, registry) = setup();
        let view = registry
            .open(column(Category::Migrated, SortKey::Volume, SortDirection::Desc))
            .unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..200 {
                    registry.toggle_sort(view, SortKey::Volume).unwrap();
                }
            });
            scope.spawn(|| {
                for volume in 1..=200 {
                    let patch = FilterPatch {
                        min_volume: Some(Some(Decimal::from(volume))),
                        ..Default::default()
                    };
                    registry.patch_filter(view, &patch).unwrap();
                }
            });
        });

        let config = registry.column(view).unwrap().view;
        assert_eq!((config.sort_by, config.direction), (SortKey::Volume, SortDirection::Desc));
        assert_eq!(config.filter.min_volume, Some(Decimal::from(200)));

        let bad = FilterPatch {
            min_price: Some(Some(Price::new(dec!(-1)))),
            min_volume: Some(None),
            ..Default::default()
        };
        assert!(registry.patch_filter(view, &bad).is_err());
        assert_eq!(registry.column(view).unwrap().view, config);
    }

    #[test]
    fn test_reconfigure_and_unknown_view() {
        let (_catalog, registry) = setup();
        let view = registry
            .open(column(Category::FinalStretch, SortKey::Name, SortDirection::Asc))
            .unwrap();

        let config = ViewConfig::new(SortKey::MarketCap, SortDirection::Desc).with_filter(ViewFilter {
            min_volume: Some(dec!(10)),
            ..Default::default()
        });
        registry.reconfigure(view, config.clone()).unwrap();
        assert_eq!(registry.column(view).unwrap().view, config);

        assert!(registry.close(view));
        assert!(matches!(
            registry.project(view),
            Err(ViewError::UnknownView(_))
        ));
    }

    #[tokio::test]
    async fn test_run_pushes_updates_to_subscribers() {
        let (catalog, registry) = setup();
        let registry = Arc::new(registry);
        let view = registry
            .open(column(Category::NewPairs, SortKey::Price, SortDirection::Asc))
            .unwrap();
        let mut rx = registry.subscribe(view).unwrap();
        let task = tokio::spawn(registry.clone().run(catalog.subscribe()));

        catalog.load(
            Category::NewPairs,
            vec![instrument(Category::NewPairs, 0, dec!(30)), instrument(Category::NewPairs, 1, dec!(10))],
        );
        rx.changed().await.unwrap();
        assert_eq!(
            prices(&rx.borrow_and_update()),
            vec![Price::new(dec!(10)), Price::new(dec!(30))]
        );

        catalog.merge(&Tick::new("new-pairs-1", Price::new(dec!(50)), dec!(40), dec!(400), 2).unwrap());
        rx.changed().await.unwrap();
        assert_eq!(
            prices(&rx.borrow_and_update()),
            vec![Price::new(dec!(30)), Price::new(dec!(50))]
        );

        // Stale ticks do not produce a change notification.
        catalog.merge(&Tick::new("new-pairs-1", Price::new(dec!(1)), dec!(0), dec!(0), 2).unwrap());
        tokio::task::yield_now().await;
        assert!(!rx.has_changed().unwrap());

        task.abort();
    }
}
