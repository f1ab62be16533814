use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Side;

/// `GET /trading/status`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct TradingStatus {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub address: Option<String>,
}

/// Account credentials for `POST /trading/connect`.
///
/// Moved into the connect call and dropped once the request body is built.
#[derive(Serialize)]
pub struct TradingCredentials {
    private_key: String,
    proxy_address: String,
}

impl TradingCredentials {
    pub fn new(private_key: impl Into<String>, proxy_address: impl Into<String>) -> Self {
        Self {
            private_key: private_key.into(),
            proxy_address: proxy_address.into(),
        }
    }

    pub fn validate(&self) -> Result<(), crate::errors::DashError> {
        if self.private_key.trim().is_empty() {
            return Err(crate::errors::DashError::Validation(
                "private key is required".into(),
            ));
        }
        if self.proxy_address.trim().is_empty() {
            return Err(crate::errors::DashError::Validation(
                "proxy address is required".into(),
            ));
        }
        Ok(())
    }

    pub fn proxy_address(&self) -> &str {
        &self.proxy_address
    }
}

impl fmt::Debug for TradingCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TradingCredentials")
            .field("private_key", &"<redacted>")
            .field("proxy_address", &self.proxy_address)
            .finish()
    }
}

/// Response of `POST /trading/connect`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// An open order on the connected trading account.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Order {
    #[serde(alias = "orderID", alias = "order_id")]
    pub id: String,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default, alias = "assetId")]
    pub asset_id: Option<String>,
    pub side: Side,
    #[serde(default, deserialize_with = "super::decimal_or_zero")]
    pub price: Decimal,
    #[serde(
        default,
        alias = "size",
        alias = "originalSize",
        deserialize_with = "super::decimal_or_zero"
    )]
    pub original_size: Decimal,
    #[serde(default, alias = "sizeMatched", deserialize_with = "super::decimal_or_zero")]
    pub size_matched: Decimal,
    #[serde(default)]
    pub status: Option<String>,
}

impl Order {
    pub fn remaining(&self) -> Decimal {
        self.original_size
            .checked_sub(self.size_matched)
            .unwrap_or(Decimal::ZERO)
            .max(Decimal::ZERO)
    }
}

/// `GET /health`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub binance_connected: bool,
    #[serde(default)]
    pub services_initialized: bool,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy" && self.services_initialized
    }
}
