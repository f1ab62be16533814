//! The dashboard session: one explicitly started, explicitly disposed owner
//! of the push connection, the trading poller, and the state they feed.

use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::api::ApiClient;
use crate::config::DashConfig;
use crate::errors::DashError;
use crate::ingestion::ws_listener::run_ws_listener;
use crate::metrics;
use crate::models::{HealthStatus, NewWallet, Signal, TradingCredentials, TradingStatus, Wallet};
use crate::services::notifier::{Notifier, Toast};
use crate::services::trading_poller::{refresh_trading, PollerHandle};
use crate::state::{DashboardState, DetailPanel, StateStore, TradingState, WalletView};

const LISTENER_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Result of a wallet selection that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The panel now shows this wallet.
    Shown,
    /// Another selection happened first; this result was dropped.
    Superseded,
}

pub struct DashboardSession {
    config: DashConfig,
    client: ApiClient,
    store: StateStore,
    notifier: Notifier,
    shutdown_tx: watch::Sender<bool>,
    listener: Option<JoinHandle<()>>,
    poller: Mutex<Option<PollerHandle>>,
}

impl DashboardSession {
    /// Open the push connection and run the startup fetches.
    ///
    /// Startup fetch failures are reported as toasts and do not fail `start`.
    pub async fn start(config: DashConfig) -> Result<Self, DashError> {
        let session = Self::connect(config)?;
        session.load_initial().await;
        Ok(session)
    }

    /// Open the push connection without fetching anything.
    pub fn connect(config: DashConfig) -> Result<Self, DashError> {
        let client = ApiClient::new(&config)?;
        let store = StateStore::new();
        let notifier = Notifier::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let listener = tokio::spawn(run_ws_listener(
            config.ws_url.clone(),
            config.reconnect_base_delay(),
            store.clone(),
            notifier.clone(),
            shutdown_rx,
        ));

        tracing::info!(api = %config.api_base_url, ws = %config.ws_url, "Dashboard session started");

        Ok(Self {
            config,
            client,
            store,
            notifier,
            shutdown_tx,
            listener: Some(listener),
            poller: Mutex::new(None),
        })
    }

    /// Price, wallets, signals and trading status, fetched concurrently.
    pub async fn load_initial(&self) {
        let _ = tokio::join!(
            self.refresh_price(),
            self.refresh_wallets(),
            self.refresh_signals(),
            self.refresh_trading_status(),
        );
    }

    pub async fn refresh_all(&self) {
        self.load_initial().await;
    }

    pub fn config(&self) -> &DashConfig {
        &self.config
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.store.subscribe()
    }

    pub fn subscribe_toasts(&self) -> broadcast::Receiver<Toast> {
        self.notifier.subscribe()
    }

    pub fn snapshot(&self) -> DashboardState {
        self.store.snapshot()
    }

    // -----------------------------------------------------------------------
    // Prices / health
    // -----------------------------------------------------------------------

    pub async fn refresh_price(&self) -> Result<(), DashError> {
        match self.client.current_price().await {
            Ok(snapshot) => {
                self.store.update(|s| s.price = Some(snapshot));
                Ok(())
            }
            Err(e) => Err(self.report("current_price", "Failed to load prices", e)),
        }
    }

    pub async fn check_health(&self) -> Result<HealthStatus, DashError> {
        match self.client.health().await {
            Ok(health) => {
                if !health.is_healthy() {
                    tracing::warn!(
                        status = %health.status,
                        binance_connected = health.binance_connected,
                        services_initialized = health.services_initialized,
                        "Backend reports degraded health"
                    );
                }
                Ok(health)
            }
            Err(e) => Err(self.report("health", "Backend health check failed", e)),
        }
    }

    // -----------------------------------------------------------------------
    // Wallets
    // -----------------------------------------------------------------------

    pub async fn refresh_wallets(&self) -> Result<(), DashError> {
        match self.client.list_wallets().await {
            Ok(wallets) => {
                tracing::debug!(count = wallets.len(), "Wallet list refreshed");
                self.store.update(|s| s.wallets = wallets);
                Ok(())
            }
            Err(e) => Err(self.report("list_wallets", "Failed to load wallets", e)),
        }
    }

    /// Validate, create, then re-fetch the list. The list is never edited locally.
    pub async fn add_wallet(&self, address: &str, label: &str) -> Result<Wallet, DashError> {
        let new_wallet = match NewWallet::validated(address, label) {
            Ok(w) => w,
            Err(e) => return Err(self.reject(e)),
        };

        let wallet = match self.client.add_wallet(&new_wallet).await {
            Ok(w) => w,
            Err(e) => return Err(self.report("add_wallet", "Failed to add wallet", e)),
        };

        tracing::info!(id = %wallet.id, address = %wallet.address, "Wallet added");
        self.notifier.success(format!("Wallet {} added", wallet.label));
        let _ = self.refresh_wallets().await;
        Ok(wallet)
    }

    /// Delete, then re-fetch the list. Clears the detail panel if it showed this wallet.
    pub async fn delete_wallet(&self, wallet_id: &str) -> Result<(), DashError> {
        let wallet_id = wallet_id.trim();
        if wallet_id.is_empty() {
            return Err(self.reject(DashError::Validation("wallet id is required".into())));
        }

        let address = self
            .store
            .snapshot()
            .wallets
            .iter()
            .find(|w| w.id == wallet_id)
            .map(|w| w.address.clone());

        if let Err(e) = self.client.delete_wallet(wallet_id).await {
            return Err(self.report("delete_wallet", "Failed to delete wallet", e));
        }

        tracing::info!(id = %wallet_id, "Wallet deleted");
        self.notifier.success("Wallet removed");

        if let Some(address) = address {
            let showing = self.store.snapshot().detail.address() == Some(address.as_str());
            if showing {
                self.store.clear_selection();
            }
        }

        let _ = self.refresh_wallets().await;
        Ok(())
    }

    /// Show `address` in the detail panel.
    ///
    /// Detail and activity are fetched concurrently and shown only once both
    /// have settled. A newer selection cancels this one; a result that still
    /// arrives for a stale selection is dropped.
    pub async fn select_wallet(&self, address: &str) -> Result<SelectOutcome, DashError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(self.reject(DashError::Validation("wallet address is required".into())));
        }

        let generation = self.store.begin_selection(address);
        let mut selection = self.store.subscribe_selection();
        tracing::debug!(address, generation, "Wallet selected");

        let fetch = async {
            tokio::join!(
                self.client.wallet_detail(address),
                self.client.wallet_activity(address, self.config.activity_limit),
            )
        };

        let (detail, activity) = tokio::select! {
            results = fetch => results,
            _ = superseded(&mut selection, generation) => {
                metrics::record_stale_detail();
                tracing::debug!(address, generation, "Detail fetch cancelled by newer selection");
                return Ok(SelectOutcome::Superseded);
            }
        };

        let fetched = match (detail, activity) {
            (Ok(detail), Ok(activity)) => Ok(WalletView {
                address: address.to_string(),
                detail,
                activity,
                fetched_at: Utc::now(),
            }),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
            (Err(e), Err(activity_err)) => {
                tracing::error!(error = %activity_err, address, "Wallet activity fetch failed");
                Err(e)
            }
        };

        let (panel, failure) = match fetched {
            Ok(view) => (DetailPanel::Ready(Box::new(view)), None),
            Err(e) => (
                DetailPanel::Failed {
                    address: address.to_string(),
                    error: e.to_string(),
                },
                Some(e),
            ),
        };

        if !self.store.apply_detail(generation, panel) {
            metrics::record_stale_detail();
            tracing::debug!(address, generation, "Discarding detail for stale selection");
            return Ok(SelectOutcome::Superseded);
        }

        match failure {
            Some(e) => Err(self.report("wallet_detail", "Failed to load wallet details", e)),
            None => Ok(SelectOutcome::Shown),
        }
    }

    pub fn clear_selection(&self) {
        self.store.clear_selection();
    }

    // -----------------------------------------------------------------------
    // Signals
    // -----------------------------------------------------------------------

    pub async fn refresh_signals(&self) -> Result<(), DashError> {
        match self.client.list_signals(self.config.signal_fetch_limit).await {
            Ok(signals) => {
                self.store.update(|s| s.signals.seed(signals));
                Ok(())
            }
            Err(e) => Err(self.report("list_signals", "Failed to load signals", e)),
        }
    }

    /// Ask the backend for a new signal. The backend also pushes it as
    /// `new_signal`; whichever arrives second is ignored by the window.
    pub async fn generate_signal(&self) -> Result<Signal, DashError> {
        match self.client.generate_signal().await {
            Ok(signal) if !signal.has_valid_confidence() => {
                let err = DashError::Decode(format!(
                    "signal {} has confidence {} outside [0, 1]",
                    signal.id, signal.confidence
                ));
                Err(self.report("generate_signal", "Failed to generate signal", err))
            }
            Ok(signal) => {
                tracing::info!(signal_id = %signal.id, kind = %signal.kind, "Signal generated");
                self.notifier.success(format!(
                    "Generated {} signal ({}% confidence)",
                    signal.kind,
                    signal.confidence_pct()
                ));
                let stored = signal.clone();
                self.store.update_if(|s| s.signals.push(stored));
                Ok(signal)
            }
            Err(e) => Err(self.report("generate_signal", "Failed to generate signal", e)),
        }
    }

    // -----------------------------------------------------------------------
    // Trading account
    // -----------------------------------------------------------------------

    /// Fetch the trading status and start or stop the poller to match.
    pub async fn refresh_trading_status(&self) -> Result<TradingStatus, DashError> {
        let status = match self.client.trading_status().await {
            Ok(status) => status,
            Err(e) => return Err(self.report("trading_status", "Failed to load trading status", e)),
        };

        if status.connected {
            let current = status.clone();
            self.store.update(|s| s.trading.status = current);
            self.start_poller();
        } else {
            self.stop_poller();
            self.store.update(|s| s.trading = TradingState::default());
        }
        Ok(status)
    }

    /// Link a trading account. The credentials are consumed by this call.
    pub async fn connect_trading(&self, credentials: TradingCredentials) -> Result<TradingStatus, DashError> {
        if let Err(e) = credentials.validate() {
            return Err(self.reject(e));
        }
        let proxy_address = credentials.proxy_address().to_string();

        let resp = match self.client.connect_trading(credentials).await {
            Ok(resp) => resp,
            Err(e) => return Err(self.report("connect_trading", "Failed to connect trading account", e)),
        };

        let status = TradingStatus {
            connected: true,
            address: resp.address.or(Some(proxy_address)),
        };
        tracing::info!(address = ?status.address, "Trading account connected");
        self.notifier.success("Trading account connected");

        let current = status.clone();
        self.store.update(|s| s.trading.status = current);
        self.start_poller();
        Ok(status)
    }

    /// Run one trading refresh now instead of waiting for the next poll.
    pub async fn refresh_trading(&self) -> Result<(), DashError> {
        if !self.store.snapshot().trading.status.connected {
            return Err(DashError::TradingNotConnected);
        }
        refresh_trading(&self.client, &self.store, &self.notifier).await;
        Ok(())
    }

    /// Stop polling and clear the trading slice.
    pub fn disconnect_trading(&self) {
        self.stop_poller();
        self.store.update(|s| s.trading = TradingState::default());
        tracing::info!("Trading panel disconnected");
    }

    pub fn is_trading_poller_running(&self) -> bool {
        self.lock_poller()
            .as_ref()
            .is_some_and(|p| !p.is_finished())
    }

    fn start_poller(&self) {
        let mut slot = self.lock_poller();
        if slot.as_ref().is_some_and(|p| !p.is_finished()) {
            return;
        }
        *slot = Some(PollerHandle::spawn(
            self.client.clone(),
            self.store.clone(),
            self.notifier.clone(),
            self.config.trading_poll_interval_secs,
        ));
    }

    fn stop_poller(&self) {
        if let Some(poller) = self.lock_poller().take() {
            poller.stop();
        }
    }

    fn lock_poller(&self) -> std::sync::MutexGuard<'_, Option<PollerHandle>> {
        self.poller.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Close the push connection and stop the poller, waiting briefly for the
    /// listener to send its close frame.
    pub async fn shutdown(mut self) {
        tracing::info!("Shutting down dashboard session");
        let _ = self.shutdown_tx.send(true);
        self.stop_poller();

        if let Some(mut listener) = self.listener.take() {
            if tokio::time::timeout(LISTENER_SHUTDOWN_GRACE, &mut listener).await.is_err() {
                tracing::warn!("Push listener did not stop in time; aborting");
                listener.abort();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Error surfacing
    // -----------------------------------------------------------------------

    /// Log a failed network operation and raise a toast. Returns the error for the caller.
    fn report(&self, operation: &'static str, what: &str, err: DashError) -> DashError {
        metrics::record_fetch_failure(operation);
        tracing::error!(error = %err, operation, "{what}");
        self.notifier.error(format!("{what}: {err}"));
        err
    }

    /// Input rejected before any network call.
    fn reject(&self, err: DashError) -> DashError {
        tracing::warn!(error = %err, "Rejected invalid input");
        self.notifier.error(err.to_string());
        err
    }
}

/// Resolves once the current selection is no longer `generation`.
async fn superseded(selection: &mut watch::Receiver<u64>, generation: u64) {
    let _ = selection.wait_for(|current| *current != generation).await;
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        self.stop_poller();
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}
