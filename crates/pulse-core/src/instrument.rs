//! Instrument identification and catalog entry types.
//!
//! An instrument is keyed by an opaque `InstrumentId`. Ids are global across
//! categories; the category of an instrument is fixed when it first enters
//! the catalog.

use crate::error::CoreError;
use crate::tick::Tick;
use crate::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque, stable instrument identifier (e.g. "new-pairs-7").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(String);

impl InstrumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for InstrumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Catalog partition an instrument belongs to. One visual column per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    NewPairs,
    FinalStretch,
    Migrated,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::NewPairs, Category::FinalStretch, Category::Migrated];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewPairs => "new-pairs",
            Self::FinalStretch => "final-stretch",
            Self::Migrated => "migrated",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new-pairs" => Ok(Self::NewPairs),
            "final-stretch" => Ok(Self::FinalStretch),
            "migrated" => Ok(Self::Migrated),
            other => Err(CoreError::UnknownVariant {
                kind: "category",
                value: other.to_string(),
            }),
        }
    }
}

/// Launch phase tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    P1,
    P2,
    P3,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::P1, Phase::P2, Phase::P3];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P1" | "p1" => Ok(Self::P1),
            "P2" | "p2" => Ok(Self::P2),
            "P3" | "p3" => Ok(Self::P3),
            other => Err(CoreError::UnknownVariant {
                kind: "phase",
                value: other.to_string(),
            }),
        }
    }
}

/// Latest known attributes of one tradable instrument.
///
/// Timestamps are Unix milliseconds. `updated_at` never moves backwards
/// for a given instrument once it is in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub id: InstrumentId,
    pub symbol: String,
    pub name: String,
    pub price: Price,
    pub price_change_24h: Decimal,
    pub price_change_percent_24h: Decimal,
    pub volume_24h: Decimal,
    pub market_cap: Decimal,
    pub liquidity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    pub category: Category,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Instrument {
    /// Validate a record before it enters the catalog.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.is_empty() {
            return Err(CoreError::InvalidInstrument("empty id".to_string()));
        }
        if self.price.inner().is_sign_negative() {
            return Err(CoreError::InvalidInstrument(format!(
                "{}: negative price {}",
                self.id, self.price
            )));
        }
        if self.volume_24h.is_sign_negative() || self.market_cap.is_sign_negative() {
            return Err(CoreError::InvalidInstrument(format!(
                "{}: negative volume or market cap",
                self.id
            )));
        }
        Ok(())
    }

    /// Apply a tick's price fields and advance `updated_at`.
    ///
    /// Callers are responsible for the staleness check; this only writes.
    pub fn apply_tick(&mut self, tick: &Tick) {
        self.price = tick.price;
        self.price_change_24h = tick.price_change;
        self.price_change_percent_24h = tick.price_change_percent;
        self.updated_at = tick.timestamp;
    }

    /// Overwrite mutable attributes from a fresher record of the same instrument.
    ///
    /// Identity (`id`, `category`, `created_at`) is kept.
    pub fn absorb(&mut self, incoming: &Instrument) {
        self.symbol = incoming.symbol.clone();
        self.name = incoming.name.clone();
        self.price = incoming.price;
        self.price_change_24h = incoming.price_change_24h;
        self.price_change_percent_24h = incoming.price_change_percent_24h;
        self.volume_24h = incoming.volume_24h;
        self.market_cap = incoming.market_cap;
        self.liquidity = incoming.liquidity;
        self.phase = incoming.phase;
        self.updated_at = incoming.updated_at;
    }
}
