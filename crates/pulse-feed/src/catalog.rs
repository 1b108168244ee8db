//! Instrument catalog.
//!
//! Single source of truth for instrument state. All mutation goes through one
//! write lock, so a reader either sees a tick fully applied or not at all.
//! Entries keep insertion order, which is the order of the `default` sort.

use crate::error::{FeedError, FeedResult};
use indexmap::IndexMap;
use parking_lot::RwLock;
use pulse_core::{now_ms, Category, Instrument, InstrumentId, Tick};
use pulse_ws::TickSink;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capacity of the change broadcast. Slow subscribers lag rather than block.
const CHANGE_CAPACITY: usize = 1024;

/// Result of merging one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    /// Tick timestamp not newer than the instrument's `updated_at`.
    Stale,
    UnknownInstrument,
}

impl MergeOutcome {
    pub fn is_mutation(self) -> bool {
        matches!(self, Self::Applied)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Stale => "stale",
            Self::UnknownInstrument => "unknown",
        }
    }
}

/// Result of one bulk load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    pub inserted: usize,
    pub updated: usize,
    /// Present with a newer or identical record; left as is.
    pub unchanged: usize,
    pub rejected: Vec<FeedError>,
}

impl LoadOutcome {
    pub fn mutated(&self) -> bool {
        self.inserted + self.updated > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Load,
    Merge,
}

/// Notification published after every visible catalog change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogChange {
    pub kind: ChangeKind,
    /// Instruments whose visible fields changed.
    pub ids: Vec<InstrumentId>,
    /// Categories whose projection may differ.
    pub categories: Vec<Category>,
    /// Global catalog version after the change.
    pub version: u64,
    /// Wall-clock Unix milliseconds of the change.
    pub at: i64,
}

impl CatalogChange {
    pub fn touches(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }
}

/// Consistent copy of one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySnapshot {
    pub category: Category,
    pub version: u64,
    pub loaded: bool,
    /// In catalog insertion order.
    pub instruments: Vec<Instrument>,
}

/// Merge counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub applied: u64,
    pub stale: u64,
    pub unknown: u64,
    pub loads: u64,
}

#[derive(Debug, Default)]
struct Inner {
    instruments: IndexMap<InstrumentId, Instrument>,
    version: u64,
    category_versions: HashMap<Category, u64>,
    loaded: HashSet<Category>,
}

impl Inner {
    fn bump(&mut self, categories: &[Category]) -> u64 {
        self.version += 1;
        for category in categories {
            *self.category_versions.entry(*category).or_insert(0) += 1;
        }
        self.version
    }

    /// Upsert one record, returning whether anything visible changed.
    fn admit(&mut self, category: Category, incoming: Instrument) -> FeedResult<Admitted> {
        incoming.validate()?;
        if incoming.category != category {
            return Err(FeedError::CategoryMismatch {
                id: incoming.id,
                expected: category,
                actual: incoming.category,
            });
        }

        match self.instruments.get_mut(&incoming.id) {
            None => {
                self.instruments.insert(incoming.id.clone(), incoming);
                Ok(Admitted::Inserted)
            }
            Some(existing) if existing.category != category => Err(FeedError::IdCollision {
                id: incoming.id,
                existing: existing.category,
                incoming: category,
            }),
            Some(existing) if incoming.updated_at < existing.updated_at => Ok(Admitted::Unchanged),
            Some(existing) => {
                let mut next = existing.clone();
                next.absorb(&incoming);
                if next == *existing {
                    Ok(Admitted::Unchanged)
                } else {
                    *existing = next;
                    Ok(Admitted::Updated)
                }
            }
        }
    }
}

enum Admitted {
    Inserted,
    Updated,
    Unchanged,
}

/// In-memory instrument catalog.
pub struct Catalog {
    inner: RwLock<Inner>,
    changes: broadcast::Sender<CatalogChange>,
    applied: AtomicU64,
    stale: AtomicU64,
    unknown: AtomicU64,
    loads: AtomicU64,
}

impl Catalog {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            inner: RwLock::new(Inner::default()),
            changes,
            applied: AtomicU64::new(0),
            stale: AtomicU64::new(0),
            unknown: AtomicU64::new(0),
            loads: AtomicU64::new(0),
        }
    }

    /// Bulk upsert of one category.
    ///
    /// Never removes entries. An existing entry keeps its identity and is
    /// overwritten only by a record at least as new as itself. The category
    /// counts as loaded afterwards, even when `instruments` is empty.
    pub fn load(&self, category: Category, instruments: Vec<Instrument>) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();
        let mut changed_ids = Vec::new();

        let mut inner = self.inner.write();
        for incoming in instruments {
            let id = incoming.id.clone();
            match inner.admit(category, incoming) {
                Ok(Admitted::Inserted) => {
                    outcome.inserted += 1;
                    changed_ids.push(id);
                }
                Ok(Admitted::Updated) => {
                    outcome.updated += 1;
                    changed_ids.push(id);
                }
                Ok(Admitted::Unchanged) => outcome.unchanged += 1,
                Err(e) => {
                    warn!(%category, error = %e, "Rejected instrument record");
                    outcome.rejected.push(e);
                }
            }
        }

        let first_load = inner.loaded.insert(category);
        if first_load || !changed_ids.is_empty() {
            let version = inner.bump(&[category]);
            self.publish(CatalogChange {
                kind: ChangeKind::Load,
                ids: changed_ids,
                categories: vec![category],
                version,
                at: now_ms(),
            });
        }
        drop(inner);

        self.loads.fetch_add(1, Ordering::Relaxed);
        info!(
            %category,
            inserted = outcome.inserted,
            updated = outcome.updated,
            unchanged = outcome.unchanged,
            rejected = outcome.rejected.len(),
            "Category loaded"
        );
        outcome
    }

    /// Merge one tick under the monotonic-timestamp rule.
    pub fn merge(&self, tick: &Tick) -> MergeOutcome {
        let mut inner = self.inner.write();

        let Some(instrument) = inner.instruments.get_mut(&tick.instrument_id) else {
            drop(inner);
            self.unknown.fetch_add(1, Ordering::Relaxed);
            debug!(id = %tick.instrument_id, "Tick for unknown instrument");
            return MergeOutcome::UnknownInstrument;
        };

        if tick.timestamp <= instrument.updated_at {
            drop(inner);
            self.stale.fetch_add(1, Ordering::Relaxed);
            return MergeOutcome::Stale;
        }

        instrument.apply_tick(tick);
        let category = instrument.category;
        let version = inner.bump(&[category]);
        self.publish(CatalogChange {
            kind: ChangeKind::Merge,
            ids: vec![tick.instrument_id.clone()],
            categories: vec![category],
            version,
            at: now_ms(),
        });
        drop(inner);

        self.applied.fetch_add(1, Ordering::Relaxed);
        MergeOutcome::Applied
    }

    fn publish(&self, change: CatalogChange) {
        // No receivers is fine: nobody is watching yet.
        let _ = self.changes.send(change);
    }

    pub fn get(&self, id: &InstrumentId) -> Option<Instrument> {
        self.inner.read().instruments.get(id).cloned()
    }

    /// Every instrument, in insertion order.
    pub fn all(&self) -> Vec<Instrument> {
        self.inner.read().instruments.values().cloned().collect()
    }

    pub fn ids(&self) -> Vec<InstrumentId> {
        self.inner.read().instruments.keys().cloned().collect()
    }

    pub fn category_snapshot(&self, category: Category) -> CategorySnapshot {
        let inner = self.inner.read();
        CategorySnapshot {
            category,
            version: inner.category_versions.get(&category).copied().unwrap_or(0),
            loaded: inner.loaded.contains(&category),
            instruments: inner
                .instruments
                .values()
                .filter(|i| i.category == category)
                .cloned()
                .collect(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogChange> {
        self.changes.subscribe()
    }

    pub fn is_loaded(&self, category: Category) -> bool {
        self.inner.read().loaded.contains(&category)
    }

    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    pub fn category_version(&self, category: Category) -> u64 {
        self.inner
            .read()
            .category_versions
            .get(&category)
            .copied()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.inner.read().instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            applied: self.applied.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            unknown: self.unknown.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSink for Catalog {
    fn accept(&self, tick: Tick) {
        self.merge(&tick);
    }
}
