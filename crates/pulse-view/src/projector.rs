//! Pure projection of instruments into one view.

use pulse_core::{Category, Instrument, SortDirection, SortKey, ViewConfig};
use std::cmp::Ordering;

/// Restrict to `category`, filter, then sort according to `config`.
///
/// `instruments` must be in catalog insertion order; `SortKey::Default`
/// keeps that order. Sorting is stable, so ties keep insertion order in
/// both directions.
pub fn project(instruments: &[Instrument], category: Category, config: &ViewConfig) -> Vec<Instrument> {
    let mut rows: Vec<Instrument> = instruments
        .iter()
        .filter(|i| i.category == category && config.filter.matches(i))
        .cloned()
        .collect();

    if config.sort_by != SortKey::Default {
        let key = config.sort_by;
        match config.direction {
            SortDirection::Asc => rows.sort_by(|a, b| compare(a, b, key)),
            SortDirection::Desc => rows.sort_by(|a, b| compare(a, b, key).reverse()),
        }
    }
    rows
}

/// Ascending comparator for `key`. `SortKey::Default` compares equal.
///
/// Names compare by Unicode lowercase, then by raw text. Letters order by
/// code point, not by locale collation, so "Émile" sorts after "zed".
pub fn compare(a: &Instrument, b: &Instrument, key: SortKey) -> Ordering {
    match key {
        SortKey::Default => Ordering::Equal,
        SortKey::Price => a.price.cmp(&b.price),
        SortKey::Volume => a.volume_24h.cmp(&b.volume_24h),
        SortKey::MarketCap => a.market_cap.cmp(&b.market_cap),
        SortKey::Change => a.price_change_percent_24h.cmp(&b.price_change_percent_24h),
        SortKey::Name => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
    }
}
