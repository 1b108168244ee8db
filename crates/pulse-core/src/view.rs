//! View configuration types.
//!
//! A view is one sorted/filtered projection of a catalog category, typically
//! backing one visual column. Configuration values are validated when they
//! are set; an invalid configuration is a programming error and is reported
//! immediately as `CoreError::InvalidConfig`.

use crate::error::CoreError;
use crate::{Category, Instrument, Phase, Price};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sort key (closed set).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    /// Catalog insertion order, no comparator.
    #[default]
    Default,
    Price,
    Volume,
    #[serde(alias = "market_cap", alias = "market-cap")]
    MarketCap,
    /// 24h percent change.
    #[serde(alias = "percent-change", alias = "percentChange")]
    Change,
    Name,
}

impl SortKey {
    pub const ALL: [SortKey; 6] = [
        SortKey::Default,
        SortKey::Price,
        SortKey::Volume,
        SortKey::MarketCap,
        SortKey::Change,
        SortKey::Name,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Price => "price",
            Self::Volume => "volume",
            Self::MarketCap => "marketCap",
            Self::Change => "change",
            Self::Name => "name",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "price" => Ok(Self::Price),
            "volume" => Ok(Self::Volume),
            "marketCap" | "market_cap" | "market-cap" => Ok(Self::MarketCap),
            "change" | "percentChange" | "percent-change" => Ok(Self::Change),
            "name" => Ok(Self::Name),
            other => Err(CoreError::InvalidConfig(format!("unknown sort key `{other}`"))),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl FromStr for SortDirection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(CoreError::InvalidConfig(format!(
                "unknown sort direction `{other}`"
            ))),
        }
    }
}

/// Phase filter with an explicit "all" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PhaseFilter {
    #[default]
    All,
    Only(Phase),
}

impl PhaseFilter {
    pub fn matches(self, phase: Option<Phase>) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => phase == Some(wanted),
        }
    }
}

impl FromStr for PhaseFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse::<Phase>()
            .map(Self::Only)
            .map_err(|_| CoreError::InvalidConfig(format!("unknown phase filter `{s}`")))
    }
}

impl TryFrom<String> for PhaseFilter {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PhaseFilter> for String {
    fn from(value: PhaseFilter) -> Self {
        match value {
            PhaseFilter::All => "all".to_string(),
            PhaseFilter::Only(phase) => phase.as_str().to_string(),
        }
    }
}

/// Conjunctive filter. Every bound is independently optional; an absent
/// bound leaves that dimension unconstrained. Price bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewFilter {
    #[serde(default)]
    pub phase: PhaseFilter,
    #[serde(default, alias = "minPrice")]
    pub min_price: Option<Price>,
    #[serde(default, alias = "maxPrice")]
    pub max_price: Option<Price>,
    #[serde(default, alias = "minVolume")]
    pub min_volume: Option<Decimal>,
}

impl ViewFilter {
    /// True iff every configured bound holds for `instrument`.
    pub fn matches(&self, instrument: &Instrument) -> bool {
        self.phase.matches(instrument.phase)
            && self.min_price.map_or(true, |min| instrument.price >= min)
            && self.max_price.map_or(true, |max| instrument.price <= max)
            && self
                .min_volume
                .map_or(true, |min| instrument.volume_24h >= min)
    }

    pub fn is_unconstrained(&self) -> bool {
        *self == Self::default()
    }

    /// Merge a partial update into this filter.
    pub fn apply_patch(&mut self, patch: &FilterPatch) {
        if let Some(phase) = patch.phase {
            self.phase = phase;
        }
        if let Some(min_price) = patch.min_price {
            self.min_price = min_price;
        }
        if let Some(max_price) = patch.max_price {
            self.max_price = max_price;
        }
        if let Some(min_volume) = patch.min_volume {
            self.min_volume = min_volume;
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, bound) in [("min_price", self.min_price), ("max_price", self.max_price)] {
            if let Some(bound) = bound {
                if bound.inner().is_sign_negative() {
                    return Err(CoreError::InvalidConfig(format!(
                        "{name} must not be negative, got {bound}"
                    )));
                }
            }
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(CoreError::InvalidConfig(format!(
                    "min_price {min} exceeds max_price {max}"
                )));
            }
        }
        if let Some(min_volume) = self.min_volume {
            if min_volume.is_sign_negative() {
                return Err(CoreError::InvalidConfig(format!(
                    "min_volume must not be negative, got {min_volume}"
                )));
            }
        }
        Ok(())
    }
}

/// Partial filter update.
///
/// `None` leaves a field untouched; `Some(None)` clears a bound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPatch {
    pub phase: Option<PhaseFilter>,
    pub min_price: Option<Option<Price>>,
    pub max_price: Option<Option<Price>>,
    pub min_volume: Option<Option<Decimal>>,
}

/// Sort and filter configuration of one view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default, alias = "sortBy")]
    pub sort_by: SortKey,
    #[serde(default, alias = "sortDirection")]
    pub direction: SortDirection,
    #[serde(default, alias = "filters")]
    pub filter: ViewFilter,
}

impl ViewConfig {
    pub fn new(sort_by: SortKey, direction: SortDirection) -> Self {
        Self {
            sort_by,
            direction,
            filter: ViewFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: ViewFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Column-header behaviour: re-selecting the active key while descending
    /// flips to ascending; anything else selects `key` descending.
    pub fn toggle_sort(&mut self, key: SortKey) {
        self.direction = if self.sort_by == key && self.direction == SortDirection::Desc {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        };
        self.sort_by = key;
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.filter.validate()
    }
}

/// One visual column: a view bound to a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub category: Category,
    #[serde(flatten)]
    pub view: ViewConfig,
}

impl ColumnConfig {
    pub fn new(id: impl Into<String>, category: Category, view: ViewConfig) -> Self {
        Self {
            id: id.into(),
            title: category.to_string(),
            category,
            view,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.trim().is_empty() {
            return Err(CoreError::InvalidConfig("column id is empty".to_string()));
        }
        self.view.validate()
    }
}
