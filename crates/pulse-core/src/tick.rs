//! Price tick types.
//!
//! `Tick` can only be built through validation: deserialization goes through
//! `RawTick` and `TryFrom`, so a malformed wire payload is rejected at the
//! ingestion boundary instead of being coerced into a bogus update.

use crate::error::CoreError;
use crate::{InstrumentId, Price};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Validated price update for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawTick")]
pub struct Tick {
    pub instrument_id: InstrumentId,
    pub price: Price,
    /// Absolute 24h change.
    pub price_change: Decimal,
    /// Percent 24h change.
    pub price_change_percent: Decimal,
    /// Unix milliseconds.
    pub timestamp: i64,
}

impl Tick {
    /// Build a tick, validating every field.
    pub fn new(
        instrument_id: impl Into<InstrumentId>,
        price: Price,
        price_change: Decimal,
        price_change_percent: Decimal,
        timestamp: i64,
    ) -> Result<Self, CoreError> {
        let instrument_id = instrument_id.into();
        if instrument_id.is_empty() {
            return Err(CoreError::InvalidTick("empty instrument id".to_string()));
        }
        if !price.is_positive() {
            return Err(CoreError::InvalidTick(format!(
                "{instrument_id}: price must be positive, got {price}"
            )));
        }
        if timestamp <= 0 {
            return Err(CoreError::InvalidTick(format!(
                "{instrument_id}: timestamp must be positive, got {timestamp}"
            )));
        }
        Ok(Self {
            instrument_id,
            price,
            price_change,
            price_change_percent,
            timestamp,
        })
    }
}

/// Unvalidated tick as it appears on the wire.
///
/// Every field is optional so that a missing field is reported by name
/// rather than as a generic serde error. `tokenId` is accepted as an alias
/// of `instrumentId`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTick {
    #[serde(default, alias = "tokenId")]
    pub instrument_id: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub price_change: Option<Decimal>,
    #[serde(default)]
    pub price_change_percent: Option<Decimal>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl TryFrom<RawTick> for Tick {
    type Error = CoreError;

    fn try_from(raw: RawTick) -> Result<Self, Self::Error> {
        let missing = |field: &str| CoreError::InvalidTick(format!("missing field `{field}`"));

        let instrument_id = raw.instrument_id.ok_or_else(|| missing("instrumentId"))?;
        let price = raw.price.ok_or_else(|| missing("price"))?;
        let price_change = raw.price_change.ok_or_else(|| missing("priceChange"))?;
        let price_change_percent = raw
            .price_change_percent
            .ok_or_else(|| missing("priceChangePercent"))?;
        let timestamp = raw.timestamp.ok_or_else(|| missing("timestamp"))?;

        Tick::new(
            instrument_id,
            Price::new(price),
            price_change,
            price_change_percent,
            timestamp,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tick_deserializes_from_sample() {
        let json = r#"{
            "instrumentId": "new-pairs-3",
            "price": "431.25",
            "priceChange": "12.5",
            "priceChangePercent": "2.98",
            "timestamp": 1700000000123
        }"#;

        let tick: Tick = serde_json::from_str(json).expect("valid tick");
        assert_eq!(tick.instrument_id.as_str(), "new-pairs-3");
        assert_eq!(tick.price, Price::new(dec!(431.25)));
        assert_eq!(tick.timestamp, 1_700_000_000_123);
    }

    #[test]
    fn test_tick_accepts_token_id_alias() {
        let json = r#"{
            "tokenId": "migrated-1",
            "price": "10",
            "priceChange": "0",
            "priceChangePercent": "0",
            "timestamp": 5
        }"#;

        let tick: Tick = serde_json::from_str(json).expect("alias accepted");
        assert_eq!(tick.instrument_id.as_str(), "migrated-1");
    }

    #[test]
    fn test_tick_missing_field_is_rejected() {
        let json = r#"{"instrumentId": "a", "price": "10", "timestamp": 5}"#;

        let err = serde_json::from_str::<Tick>(json).unwrap_err();
        assert!(err.to_string().contains("priceChange"));
    }

    #[test]
    fn test_tick_rejects_non_positive_values() {
        assert!(Tick::new("a", Price::ZERO, dec!(0), dec!(0), 5).is_err());
        assert!(Tick::new("a", Price::new(dec!(1)), dec!(0), dec!(0), 0).is_err());
        assert!(Tick::new("  ", Price::new(dec!(1)), dec!(0), dec!(0), 5).is_err());
        assert!(Tick::new("a", Price::new(dec!(1)), dec!(-1), dec!(-9), 5).is_ok());
    }
}
