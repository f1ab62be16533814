//! Client-side mirrors of server state.
//!
//! Every slice is replaced wholesale by the fetch or push that produced it.
//! All mutation goes through [`StateStore`], which publishes each change on a
//! `watch` channel so views re-render from one consistent snapshot.

pub mod signal_window;

pub use signal_window::{SignalWindow, SIGNAL_WINDOW};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::models::{ActivityEvent, Order, Position, PriceSnapshot, TradingStatus, Wallet, WalletDetail};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
    Closed,
}

/// What the wallet detail panel currently shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DetailPanel {
    #[default]
    Empty,
    Loading {
        address: String,
    },
    Ready(Box<WalletView>),
    /// Fetch failed; nothing from the previous selection is kept.
    Failed {
        address: String,
        error: String,
    },
}

impl DetailPanel {
    pub fn address(&self) -> Option<&str> {
        match self {
            DetailPanel::Empty => None,
            DetailPanel::Loading { address } | DetailPanel::Failed { address, .. } => Some(address),
            DetailPanel::Ready(view) => Some(&view.address),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, DetailPanel::Loading { .. })
    }

    pub fn view(&self) -> Option<&WalletView> {
        match self {
            DetailPanel::Ready(view) => Some(view),
            _ => None,
        }
    }
}

/// Detail and activity for one wallet, shown together once both have settled.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletView {
    pub address: String,
    pub detail: WalletDetail,
    pub activity: Vec<ActivityEvent>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TradingState {
    pub status: TradingStatus,
    pub positions: Vec<Position>,
    pub orders: Vec<Order>,
    pub history: Vec<ActivityEvent>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub connection: ConnectionStatus,
    pub price: Option<PriceSnapshot>,
    pub signals: SignalWindow,
    pub wallets: Vec<Wallet>,
    pub detail: DetailPanel,
    pub trading: TradingState,
}

/// Owner of the dashboard state and of the wallet selection generation.
///
/// The generation increments on every selection (and on clearing one) and
/// is what detail fetches check before applying their result.
#[derive(Debug, Clone)]
pub struct StateStore {
    state: watch::Sender<DashboardState>,
    selection: watch::Sender<u64>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(DashboardState::default());
        let (selection, _) = watch::channel(0);
        Self { state, selection }
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    /// Apply a mutation and notify subscribers.
    pub fn update<F: FnOnce(&mut DashboardState)>(&self, f: F) {
        self.state.send_modify(f);
    }

    /// Apply a mutation; subscribers are notified only if `f` returns true.
    pub fn update_if<F: FnOnce(&mut DashboardState) -> bool>(&self, f: F) -> bool {
        self.state.send_if_modified(f)
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    pub fn selection_generation(&self) -> u64 {
        *self.selection.borrow()
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<u64> {
        self.selection.subscribe()
    }

    /// Start a new selection and put the panel in `Loading`. Returns its generation.
    ///
    /// The generation bump and the `Loading` write happen in one state
    /// update, so a concurrent selection can never interleave between them.
    pub fn begin_selection(&self, address: &str) -> u64 {
        let mut generation = 0;
        self.update(|s| {
            generation = self.bump_generation();
            s.detail = DetailPanel::Loading {
                address: address.to_string(),
            };
        });
        generation
    }

    /// Drop the current selection, invalidating any in-flight fetch.
    pub fn clear_selection(&self) {
        self.update(|s| {
            self.bump_generation();
            s.detail = DetailPanel::Empty;
        });
    }

    // Callers hold the state lock; the lock order is always state, then selection.
    fn bump_generation(&self) -> u64 {
        let mut generation = 0;
        self.selection.send_modify(|g| {
            *g += 1;
            generation = *g;
        });
        generation
    }

    /// Set the detail panel if `generation` is still the current selection.
    ///
    /// The check and the write happen under the state lock, so a result for
    /// a superseded selection can never overwrite a newer one.
    pub fn apply_detail(&self, generation: u64, panel: DetailPanel) -> bool {
        self.update_if(|s| {
            if *self.selection.borrow() != generation {
                return false;
            }
            s.detail = panel;
            true
        })
    }
}
