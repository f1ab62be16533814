use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::normalize::normalize_collection;
use crate::config::DashConfig;
use crate::errors::{status_error, DashError};
use crate::models::{
    ActivityEvent, ConnectResponse, HealthStatus, NewWallet, Order, Position, PriceSnapshot,
    Signal, TradingCredentials, TradingStatus, Wallet, WalletDetail,
};

/// Typed client for the dashboard backend's REST API.
///
/// Collection endpoints go through [`normalize_collection`]; single-object
/// endpoints are decoded strictly and fail with [`DashError::Decode`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &DashConfig) -> Result<Self, DashError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Self::with_client(http, &config.api_base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, DashError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| DashError::Validation(format!("invalid API URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(DashError::Validation(format!("invalid API URL {base_url}")));
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    // -----------------------------------------------------------------------
    // Prices / health
    // -----------------------------------------------------------------------

    pub async fn current_price(&self) -> Result<PriceSnapshot, DashError> {
        self.fetch_object(self.request(Method::GET, &["prices", "current"], &[]))
            .await
    }

    pub async fn health(&self) -> Result<HealthStatus, DashError> {
        self.fetch_object(self.request(Method::GET, &["health"], &[]))
            .await
    }

    // -----------------------------------------------------------------------
    // Wallets
    // -----------------------------------------------------------------------

    pub async fn list_wallets(&self) -> Result<Vec<Wallet>, DashError> {
        self.fetch_collection(self.request(Method::GET, &["wallets"], &[]))
            .await
    }

    pub async fn add_wallet(&self, wallet: &NewWallet) -> Result<Wallet, DashError> {
        let req = self.request(Method::POST, &["wallets"], &[]).json(wallet);
        self.fetch_object(req).await
    }

    pub async fn delete_wallet(&self, wallet_id: &str) -> Result<(), DashError> {
        self.send(self.request(Method::DELETE, &["wallets", wallet_id], &[]))
            .await
            .map(|_| ())
    }

    pub async fn wallet_detail(&self, address: &str) -> Result<WalletDetail, DashError> {
        self.fetch_object(self.request(Method::GET, &["wallets", address, "detailed"], &[]))
            .await
    }

    pub async fn wallet_activity(
        &self,
        address: &str,
        limit: u32,
    ) -> Result<Vec<ActivityEvent>, DashError> {
        let limit = limit.to_string();
        self.fetch_collection(self.request(
            Method::GET,
            &["wallets", address, "activity-feed"],
            &[("limit", &limit)],
        ))
        .await
    }

    // -----------------------------------------------------------------------
    // Signals
    // -----------------------------------------------------------------------

    pub async fn list_signals(&self, limit: u32) -> Result<Vec<Signal>, DashError> {
        let limit = limit.to_string();
        self.fetch_collection(self.request(Method::GET, &["signals"], &[("limit", &limit)]))
            .await
    }

    pub async fn generate_signal(&self) -> Result<Signal, DashError> {
        self.fetch_object(self.request(Method::POST, &["signals", "generate"], &[]))
            .await
    }

    // -----------------------------------------------------------------------
    // Trading account
    // -----------------------------------------------------------------------

    pub async fn trading_status(&self) -> Result<TradingStatus, DashError> {
        self.fetch_object(self.request(Method::GET, &["trading", "status"], &[]))
            .await
    }

    /// Link a trading account. `credentials` is consumed and dropped here.
    pub async fn connect_trading(
        &self,
        credentials: TradingCredentials,
    ) -> Result<ConnectResponse, DashError> {
        credentials.validate()?;
        let req = self
            .request(Method::POST, &["trading", "connect"], &[])
            .json(&credentials);
        drop(credentials);

        let resp: ConnectResponse = self.fetch_object(req).await?;
        if !resp.success {
            return Err(DashError::Rejected(
                resp.error
                    .or(resp.message)
                    .unwrap_or_else(|| "account connection failed".into()),
            ));
        }
        Ok(resp)
    }

    pub async fn trading_positions(&self) -> Result<Vec<Position>, DashError> {
        self.fetch_collection(self.request(Method::GET, &["trading", "positions"], &[]))
            .await
    }

    pub async fn trading_orders(&self) -> Result<Vec<Order>, DashError> {
        self.fetch_collection(self.request(Method::GET, &["trading", "orders"], &[]))
            .await
    }

    pub async fn trading_history(&self) -> Result<Vec<ActivityEvent>, DashError> {
        self.fetch_collection(self.request(Method::GET, &["trading", "history"], &[]))
            .await
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    /// Build a request for `{base}/{segments...}?{query}` with each segment percent-encoded.
    fn request(&self, method: Method, segments: &[&str], query: &[(&str, &str)]) -> RequestBuilder {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        tracing::debug!(method = %method, url = %url, "API request");
        self.http.request(method, url)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Value, DashError> {
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_object<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, DashError> {
        let value = self.send(req).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn fetch_collection<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<Vec<T>, DashError> {
        let value = self.send(req).await?;
        Ok(normalize_collection(value))
    }
}
