use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::api::ApiClient;
use crate::errors::DashError;
use crate::metrics;
use crate::services::notifier::Notifier;
use crate::state::StateStore;

/// A running trading poller. Stopping it both signals the loop and aborts
/// the task, so no refresh lands after `stop` returns.
#[derive(Debug)]
pub struct PollerHandle {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PollerHandle {
    pub fn spawn(client: ApiClient, store: StateStore, notifier: Notifier, interval_secs: u64) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_trading_poller(
            client,
            store,
            notifier,
            interval_secs,
            stop_rx,
        ));
        Self { stop_tx, handle }
    }

    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Refresh positions, orders and history on a fixed interval until stopped.
///
/// The first refresh runs immediately.
pub async fn run_trading_poller(
    client: ApiClient,
    store: StateStore,
    notifier: Notifier,
    interval_secs: u64,
    mut stop: watch::Receiver<bool>,
) {
    tracing::info!(interval_secs, "Trading poller started");

    let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                refresh_trading(&client, &store, &notifier).await;
            }
            _ = stop.changed() => break,
        }
    }

    tracing::info!("Trading poller stopped");
}

/// Fetch the three trading collections concurrently and replace each slice
/// that succeeded. Each failure is reported on its own.
pub async fn refresh_trading(client: &ApiClient, store: &StateStore, notifier: &Notifier) {
    let (positions, orders, history) = tokio::join!(
        client.trading_positions(),
        client.trading_orders(),
        client.trading_history(),
    );

    let positions = ok_or_report(positions, "trading_positions", "positions", notifier);
    let orders = ok_or_report(orders, "trading_orders", "orders", notifier);
    let history = ok_or_report(history, "trading_history", "trade history", notifier);

    store.update_if(|s| {
        // Disconnected while the requests were in flight.
        if !s.trading.status.connected {
            return false;
        }
        if let Some(positions) = positions {
            s.trading.positions = positions;
        }
        if let Some(orders) = orders {
            s.trading.orders = orders;
        }
        if let Some(history) = history {
            s.trading.history = history;
        }
        s.trading.last_refreshed = Some(Utc::now());
        true
    });
}

fn ok_or_report<T>(
    result: Result<T, DashError>,
    operation: &'static str,
    what: &str,
    notifier: &Notifier,
) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            metrics::record_fetch_failure(operation);
            tracing::error!(error = %e, operation, "Trading refresh failed");
            notifier.error(format!("Failed to refresh {what}: {e}"));
            None
        }
    }
}
