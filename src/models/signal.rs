use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;

/// An AI-generated trade signal.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Signal {
    pub id: String,
    /// BUY or SELL.
    #[serde(alias = "signal_type", alias = "signalType")]
    pub kind: Side,
    /// Model confidence in [0, 1].
    #[serde(deserialize_with = "super::required_decimal")]
    pub confidence: Decimal,
    #[serde(default)]
    pub reason: String,
    #[serde(
        default,
        alias = "binance_price",
        alias = "referencePrice",
        deserialize_with = "super::decimal_or_zero"
    )]
    pub reference_price: Decimal,
    #[serde(
        default,
        alias = "polymarket_price",
        alias = "marketPrice",
        deserialize_with = "super::decimal_or_zero"
    )]
    pub market_price: Decimal,
    #[serde(
        default,
        alias = "price_delta",
        alias = "priceDelta",
        deserialize_with = "super::decimal_or_zero"
    )]
    pub delta: Decimal,
    #[serde(
        alias = "timestamp",
        alias = "createdAt",
        deserialize_with = "super::required_timestamp"
    )]
    pub created_at: DateTime<Utc>,
}

impl Signal {
    /// Decoding accepts any number; the window only admits confidences in [0, 1].
    pub fn has_valid_confidence(&self) -> bool {
        self.confidence >= Decimal::ZERO && self.confidence <= Decimal::ONE
    }

    /// Confidence as a whole percentage, e.g. 0.854 -> 85. Zero if the
    /// stored value is too large to scale.
    pub fn confidence_pct(&self) -> Decimal {
        self.confidence
            .checked_mul(Decimal::ONE_HUNDRED)
            .map(|pct| pct.trunc())
            .unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_backend_signal() {
        let signal: Signal = serde_json::from_value(json!({
            "id": "5c0e6c1a",
            "signal_type": "BUY",
            "confidence": 0.85,
            "reason": "Spot leads market by a wide margin",
            "binance_price": 97000.12,
            "polymarket_price": 0.5321,
            "price_delta": 96999.59,
            "timestamp": "2026-01-15T10:30:00+00:00"
        }))
        .unwrap();

        assert_eq!(signal.kind, Side::Buy);
        assert!(signal.has_valid_confidence());
        assert_eq!(signal.confidence_pct(), Decimal::from(85));
        assert_eq!(signal.market_price, Decimal::new(5321, 4));
    }

    #[test]
    fn test_missing_kind_is_rejected() {
        let result = serde_json::from_value::<Signal>(json!({
            "id": "x",
            "confidence": 0.5,
            "timestamp": "2026-01-15T10:30:00+00:00"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_out_of_range_confidence_flagged() {
        let signal: Signal = serde_json::from_value(json!({
            "id": "x",
            "signal_type": "SELL",
            "confidence": 1.7,
            "timestamp": "2026-01-15T10:30:00+00:00"
        }))
        .unwrap();
        assert!(!signal.has_valid_confidence());
    }

    #[test]
    fn test_huge_confidence_does_not_overflow_percentage() {
        let signal: Signal = serde_json::from_value(json!({
            "id": "x",
            "signal_type": "BUY",
            "confidence": "7e28",
            "timestamp": "2026-01-15T10:30:00+00:00"
        }))
        .unwrap();
        assert!(!signal.has_valid_confidence());
        assert_eq!(signal.confidence_pct(), Decimal::ZERO);
    }
}
