use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Spot reference price vs prediction-market price, as computed by the backend.
///
/// `delta` is taken verbatim from the server and never recomputed here.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PriceSnapshot {
    #[serde(
        alias = "binance_price",
        alias = "referencePrice",
        deserialize_with = "super::required_decimal"
    )]
    pub reference_price: Decimal,
    #[serde(
        alias = "polymarket_price",
        alias = "marketPrice",
        deserialize_with = "super::required_decimal"
    )]
    pub market_price: Decimal,
    #[serde(
        alias = "price_delta",
        alias = "priceDelta",
        deserialize_with = "super::required_decimal"
    )]
    pub delta: Decimal,
    #[serde(
        default = "Utc::now",
        alias = "timestamp",
        alias = "observedAt",
        deserialize_with = "super::required_timestamp"
    )]
    pub observed_at: DateTime<Utc>,
}
