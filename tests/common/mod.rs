//! In-process mock of the dashboard backend: REST routes under `/api` and a
//! Socket.IO-style push channel at `/api/socket.io/`.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};

use polydash::config::DashConfig;
use polydash::state::DashboardState;

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Inner {
    wallets: Vec<Value>,
    detail_delays: HashMap<String, Duration>,
    failing: HashSet<&'static str>,
    trading_connected: bool,
    generated_confidence: Option<Value>,
    listed_signals: Vec<Value>,
}

#[derive(Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    inner: Arc<Mutex<Inner>>,
    push_tx: broadcast::Sender<String>,
    kick_tx: broadcast::Sender<()>,
    clients: Arc<watch::Sender<usize>>,
    wallet_posts: Arc<AtomicUsize>,
    connect_posts: Arc<AtomicUsize>,
    trading_polls: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl MockBackend {
    pub async fn start() -> Self {
        let _ = rustls::crypto::ring::default_provider().install_default();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("mock backend address");

        let (push_tx, _) = broadcast::channel(256);
        let (kick_tx, _) = broadcast::channel(4);
        let (clients, _) = watch::channel(0usize);
        let backend = Self {
            addr,
            inner: Arc::new(Mutex::new(Inner::default())),
            push_tx,
            kick_tx,
            clients: Arc::new(clients),
            wallet_posts: Arc::new(AtomicUsize::new(0)),
            connect_posts: Arc::new(AtomicUsize::new(0)),
            trading_polls: Arc::new(AtomicUsize::new(0)),
        };

        let router = Router::new()
            .route("/api/health", get(health))
            .route("/api/prices/current", get(current_price))
            .route("/api/wallets", get(list_wallets).post(add_wallet))
            .route("/api/wallets/:address", delete(delete_wallet))
            .route("/api/wallets/:address/detailed", get(wallet_detail))
            .route("/api/wallets/:address/activity-feed", get(wallet_activity))
            .route("/api/signals", get(list_signals))
            .route("/api/signals/generate", post(generate_signal))
            .route("/api/trading/status", get(trading_status))
            .route("/api/trading/connect", post(connect_trading))
            .route("/api/trading/positions", get(trading_positions))
            .route("/api/trading/orders", get(trading_orders))
            .route("/api/trading/history", get(trading_history))
            .route("/api/socket.io/", get(socket_io))
            .with_state(backend.clone());

        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("mock backend crashed");
        });

        backend
    }

    /// Session config pointed at this backend, with a one-second trading poll
    /// and a short reconnect delay.
    pub fn config(&self) -> DashConfig {
        let mut config = DashConfig::new(format!("http://{}/api", self.addr));
        config.request_timeout_secs = 5;
        config.trading_poll_interval_secs = 1;
        config.reconnect_base_delay_ms = 200;
        config
    }

    pub fn set_detail_delay(&self, address: &str, delay: Duration) {
        self.lock().detail_delays.insert(address.to_string(), delay);
    }

    /// Make a route answer 500. Names: `wallets`, `detail`, `activity`, `signals`, `positions`.
    pub fn fail(&self, route: &'static str) {
        self.lock().failing.insert(route);
    }

    pub fn recover(&self, route: &'static str) {
        self.lock().failing.remove(route);
    }

    /// Confidence carried by the next generated signal, as raw JSON.
    pub fn set_generated_confidence(&self, confidence: Value) {
        self.lock().generated_confidence = Some(confidence);
    }

    /// Signals returned by `GET /signals`.
    pub fn set_listed_signals(&self, signals: Vec<Value>) {
        self.lock().listed_signals = signals;
    }

    pub fn wallet_posts(&self) -> usize {
        self.wallet_posts.load(Ordering::SeqCst)
    }

    pub fn connect_posts(&self) -> usize {
        self.connect_posts.load(Ordering::SeqCst)
    }

    pub fn trading_polls(&self) -> usize {
        self.trading_polls.load(Ordering::SeqCst)
    }

    /// Send `42["event", payload]` to every connected push client.
    pub fn push(&self, event: &str, payload: Value) {
        let frame = format!("42{}", json!([event, payload]));
        let _ = self.push_tx.send(frame);
    }

    pub fn push_raw(&self, frame: &str) {
        let _ = self.push_tx.send(frame.to_string());
    }

    /// Drop every push connection without a close frame, as a crashed server would.
    pub fn kick_clients(&self) {
        let _ = self.kick_tx.send(());
    }

    pub async fn wait_for_client(&self) {
        self.wait_for_clients(|n| n > 0).await;
    }

    pub async fn wait_for_clients(&self, f: impl Fn(usize) -> bool) {
        let mut rx = self.clients.subscribe();
        tokio::time::timeout(WAIT_TIMEOUT, rx.wait_for(|n| f(*n)))
            .await
            .expect("timed out waiting for push clients")
            .expect("client counter closed");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("mock state poisoned")
    }

    fn failing(&self, route: &'static str) -> bool {
        self.lock().failing.contains(route)
    }
}

/// Wait until the dashboard state satisfies `f`, returning that snapshot.
#[allow(dead_code)]
pub async fn wait_for(
    rx: &mut watch::Receiver<DashboardState>,
    f: impl FnMut(&DashboardState) -> bool,
) -> DashboardState {
    tokio::time::timeout(WAIT_TIMEOUT, rx.wait_for(f))
        .await
        .expect("timed out waiting for dashboard state")
        .expect("state channel closed")
        .clone()
}

#[allow(dead_code)]
pub fn signal_json(id: &str, kind: &str, confidence: f64, second: u32) -> Value {
    json!({
        "id": id,
        "signal_type": kind,
        "confidence": confidence,
        "reason": "spread widened",
        "binance_price": 97000.0,
        "polymarket_price": 0.52,
        "price_delta": 1.5,
        "timestamp": format!("2026-01-15T10:{:02}:{:02}+00:00", second / 60, second % 60),
    })
}

#[allow(dead_code)]
pub fn price_json(reference: f64, market: f64, delta: f64) -> Value {
    json!({
        "binance_price": reference,
        "polymarket_price": market,
        "price_delta": delta,
        "timestamp": "2026-01-15T10:30:00+00:00",
    })
}

fn server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "detail": "Internal server error" })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// REST handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "binance_connected": true, "services_initialized": true }))
}

async fn current_price() -> Json<Value> {
    Json(price_json(96000.0, 0.5, 1.0))
}

async fn list_wallets(State(b): State<MockBackend>) -> Response {
    if b.failing("wallets") {
        return server_error();
    }
    let wallets = b.lock().wallets.clone();
    Json(json!({ "wallets": wallets })).into_response()
}

async fn add_wallet(State(b): State<MockBackend>, Json(body): Json<Value>) -> Response {
    b.wallet_posts.fetch_add(1, Ordering::SeqCst);
    let wallet = json!({
        "id": uuid::Uuid::new_v4().to_string(),
        "address": body["address"],
        "label": body["label"],
        "added_at": "2026-01-15T10:30:00Z",
    });
    b.lock().wallets.push(wallet.clone());
    (StatusCode::CREATED, Json(wallet)).into_response()
}

async fn delete_wallet(State(b): State<MockBackend>, Path(id): Path<String>) -> Response {
    let mut inner = b.lock();
    let before = inner.wallets.len();
    inner.wallets.retain(|w| w["id"] != id.as_str());
    if inner.wallets.len() == before {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Wallet not found" }))).into_response();
    }
    Json(json!({ "message": "Wallet removed" })).into_response()
}

async fn wallet_detail(State(b): State<MockBackend>, Path(address): Path<String>) -> Response {
    let delay = b.lock().detail_delays.get(&address).copied();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if b.failing("detail") {
        return server_error();
    }
    Json(json!({
        "address": address,
        "total_value": 200.0,
        "total_pnl": 20.0,
        "unrealized_pnl": 20.0,
        "realized_pnl": 0.0,
        "total_positions": 2,
        "buying_positions": [
            { "market": "Will BTC close up?", "outcome": "Yes", "size": 300, "avg_price": 0.4,
              "current_price": 0.5, "current_value": 150, "unrealized_pnl": 30, "pnl_percent": 25 }
        ],
        "selling_positions": [
            { "market": "Fed cut", "outcome": "No", "size": -100, "avg_price": 0.6,
              "current_price": 0.5, "current_value": -50, "unrealized_pnl": -10, "pnl_percent": -16.7 }
        ],
    }))
    .into_response()
}

async fn wallet_activity(
    State(b): State<MockBackend>,
    Path(address): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if b.failing("activity") {
        return server_error();
    }
    let limit: usize = params.get("limit").and_then(|l| l.parse().ok()).unwrap_or(50);
    let activity: Vec<Value> = (0..3)
        .take(limit)
        .map(|i| {
            json!({
                "title": format!("{address} market {i}"),
                "side": if i % 2 == 0 { "BUY" } else { "SELL" },
                "size": 10 + i,
                "price": 0.5,
                "timestamp": 1_768_473_000 + i,
            })
        })
        .collect();
    Json(json!({ "activity": activity })).into_response()
}

async fn list_signals(State(b): State<MockBackend>) -> Response {
    if b.failing("signals") {
        return server_error();
    }
    let signals = b.lock().listed_signals.clone();
    Json(json!({ "signals": signals })).into_response()
}

async fn generate_signal(State(b): State<MockBackend>) -> Json<Value> {
    let mut signal = signal_json("gen-1", "BUY", 0.85, 0);
    if let Some(confidence) = b.lock().generated_confidence.clone() {
        signal["confidence"] = confidence;
    }
    Json(signal)
}

async fn trading_status(State(b): State<MockBackend>) -> Json<Value> {
    let connected = b.lock().trading_connected;
    Json(json!({ "connected": connected, "address": connected.then_some("0xproxy") }))
}

async fn connect_trading(State(b): State<MockBackend>, Json(body): Json<Value>) -> Json<Value> {
    b.connect_posts.fetch_add(1, Ordering::SeqCst);
    if body["private_key"].as_str() == Some("bad-key") {
        return Json(json!({ "success": false, "error": "Invalid private key" }));
    }
    b.lock().trading_connected = true;
    Json(json!({ "success": true, "address": body["proxy_address"], "message": "connected" }))
}

async fn trading_positions(State(b): State<MockBackend>) -> Response {
    b.trading_polls.fetch_add(1, Ordering::SeqCst);
    if b.failing("positions") {
        return server_error();
    }
    Json(json!([
        { "title": "Will BTC close up?", "outcome": "Yes", "size": 10, "avgPrice": 0.4,
          "curPrice": 0.5, "currentValue": 5, "cashPnl": 1, "percentPnl": 25 }
    ]))
    .into_response()
}

async fn trading_orders() -> Json<Value> {
    Json(json!({ "orders": [
        { "orderID": "o1", "side": "BUY", "price": 0.45, "size": 20, "sizeMatched": 5, "status": "LIVE" }
    ] }))
}

async fn trading_history() -> Json<Value> {
    Json(json!({ "history": [] }))
}

// ---------------------------------------------------------------------------
// Push channel
// ---------------------------------------------------------------------------

async fn socket_io(ws: WebSocketUpgrade, State(b): State<MockBackend>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, b))
}

async fn handle_socket(mut socket: WebSocket, b: MockBackend) {
    let mut rx = b.push_tx.subscribe();
    let mut kicked = b.kick_tx.subscribe();
    let mut joined = false;

    let open = r#"0{"sid":"mock","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
    if socket.send(Message::Text(open.to_string())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            _ = kicked.recv() => break,
            frame = rx.recv(), if joined => {
                match frame {
                    Ok(frame) => {
                        if socket.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            client_msg = socket.recv() => {
                match client_msg {
                    Some(Ok(Message::Text(text))) if text == "40" => {
                        if socket.send(Message::Text(r#"40{"sid":"ns"}"#.to_string())).await.is_err() {
                            break;
                        }
                        joined = true;
                        b.clients.send_modify(|n| *n += 1);
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    if joined {
        b.clients.send_modify(|n| *n -= 1);
    }
    // Dropping the socket here ends the TCP stream with no close frame.
    drop(socket);
}
