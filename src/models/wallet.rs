use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;
use crate::api::normalize::lenient_vec;

/// A tracked external wallet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Wallet {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub label: String,
    #[serde(
        default,
        alias = "addedAt",
        deserialize_with = "super::optional_timestamp"
    )]
    pub added_at: Option<DateTime<Utc>>,
}

/// Body of `POST /wallets`.
#[derive(Debug, Clone, Serialize)]
pub struct NewWallet {
    pub address: String,
    pub label: String,
}

impl NewWallet {
    /// Trim both fields and reject empty ones before anything goes on the wire.
    pub fn validated(address: &str, label: &str) -> Result<Self, crate::errors::DashError> {
        let address = address.trim();
        let label = label.trim();
        if address.is_empty() {
            return Err(crate::errors::DashError::Validation(
                "wallet address is required".into(),
            ));
        }
        if label.is_empty() {
            return Err(crate::errors::DashError::Validation(
                "wallet label is required".into(),
            ));
        }
        Ok(Self {
            address: address.to_string(),
            label: label.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// One market position held by a wallet.
///
/// Accepts both the backend's snake_case names and the Data API's camelCase ones.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Position {
    #[serde(default, alias = "title", alias = "question")]
    pub market: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default, alias = "shares", deserialize_with = "super::decimal_or_zero")]
    pub size: Decimal,
    #[serde(default, alias = "avgPrice", deserialize_with = "super::decimal_or_zero")]
    pub avg_price: Decimal,
    #[serde(
        default,
        alias = "curPrice",
        alias = "currentPrice",
        deserialize_with = "super::decimal_or_zero"
    )]
    pub current_price: Decimal,
    #[serde(default, alias = "currentValue", deserialize_with = "super::decimal_or_zero")]
    pub current_value: Decimal,
    #[serde(
        default,
        alias = "unrealizedPnl",
        alias = "cashPnl",
        alias = "pnl",
        deserialize_with = "super::decimal_or_zero"
    )]
    pub unrealized_pnl: Decimal,
    #[serde(
        default,
        alias = "pnlPercent",
        alias = "percentPnl",
        deserialize_with = "super::decimal_or_zero"
    )]
    pub pnl_percent: Decimal,
}

impl Position {
    /// Selling positions arrive with negative size/value; display uses magnitudes.
    pub fn for_display(&self) -> Position {
        Position {
            size: self.size.abs(),
            current_value: self.current_value.abs(),
            ..self.clone()
        }
    }

    pub fn is_winning(&self) -> bool {
        self.unrealized_pnl > Decimal::ZERO
    }
}

/// Position breakdown for one wallet (`GET /wallets/{address}/detailed`).
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct WalletDetail {
    #[serde(default)]
    pub address: String,
    #[serde(default, alias = "totalValue", deserialize_with = "super::decimal_or_zero")]
    pub total_value: Decimal,
    #[serde(default, alias = "totalPnl", deserialize_with = "super::decimal_or_zero")]
    pub total_pnl: Decimal,
    #[serde(default, alias = "unrealizedPnl", deserialize_with = "super::decimal_or_zero")]
    pub unrealized_pnl: Decimal,
    #[serde(default, alias = "realizedPnl", deserialize_with = "super::decimal_or_zero")]
    pub realized_pnl: Decimal,
    #[serde(default, alias = "total_positions", alias = "positionCount")]
    pub reported_position_count: Option<u32>,
    #[serde(default, alias = "buyingPositions", deserialize_with = "lenient_vec")]
    pub buying_positions: Vec<Position>,
    #[serde(default, alias = "sellingPositions", deserialize_with = "lenient_vec")]
    pub selling_positions: Vec<Position>,
}

impl WalletDetail {
    /// Buying positions followed by selling positions.
    pub fn all_positions(&self) -> impl Iterator<Item = &Position> {
        self.buying_positions.iter().chain(self.selling_positions.iter())
    }

    /// Server-reported count when present, otherwise the number of positions received.
    pub fn position_count(&self) -> u32 {
        self.reported_position_count.unwrap_or_else(|| {
            (self.buying_positions.len() + self.selling_positions.len()) as u32
        })
    }
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

/// One entry of a wallet's activity feed, most recent first.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ActivityEvent {
    #[serde(default, alias = "title")]
    pub market: String,
    #[serde(alias = "side")]
    pub action: Side,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default, alias = "size", deserialize_with = "super::decimal_or_zero")]
    pub shares: Decimal,
    #[serde(default, deserialize_with = "super::decimal_or_zero")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "super::optional_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}
