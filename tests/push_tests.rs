mod common;

use rust_decimal::Decimal;
use tokio::sync::broadcast::error::TryRecvError;

use polydash::services::notifier::ToastLevel;
use polydash::state::{ConnectionStatus, SIGNAL_WINDOW};
use polydash::view::render_ticker;
use polydash::DashboardSession;

use common::{price_json, signal_json, wait_for, MockBackend};

async fn start_connected() -> (MockBackend, DashboardSession) {
    let backend = MockBackend::start().await;
    let session = DashboardSession::start(backend.config())
        .await
        .expect("session should start");
    backend.wait_for_client().await;
    (backend, session)
}

#[tokio::test]
async fn test_price_push_updates_ticker() {
    let (backend, session) = start_connected().await;
    let mut state_rx = session.subscribe();

    backend.push("price_update", price_json(97000.12, 0.5321, 3.4));

    let state = wait_for(&mut state_rx, |s| {
        s.price.as_ref().is_some_and(|p| p.market_price == Decimal::new(5321, 4))
    })
    .await;

    let ticker = render_ticker(state.price.as_ref());
    assert!(ticker.contains("97000.12"));
    assert!(ticker.contains("0.5321"));
    assert!(ticker.contains("3.40"));

    session.shutdown().await;
}

#[tokio::test]
async fn test_signal_window_keeps_newest_twenty() {
    let (backend, session) = start_connected().await;
    let mut state_rx = session.subscribe();

    for i in 0..25u32 {
        backend.push("new_signal", signal_json(&format!("sig-{i}"), "BUY", 0.7, i));
    }

    let state = wait_for(&mut state_rx, |s| {
        s.signals.latest().is_some_and(|sig| sig.id == "sig-24")
    })
    .await;

    assert_eq!(state.signals.len(), SIGNAL_WINDOW);
    let ids: Vec<&str> = state.signals.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids.first(), Some(&"sig-24"));
    assert_eq!(ids.last(), Some(&"sig-5"));
    assert!(!state.signals.contains("sig-4"));

    session.shutdown().await;
}

#[tokio::test]
async fn test_pushed_copy_of_generated_signal_is_ignored() {
    let (backend, session) = start_connected().await;
    let mut state_rx = session.subscribe();

    let generated = session.generate_signal().await.unwrap();
    let mut toasts = session.subscribe_toasts();

    backend.push("new_signal", signal_json(&generated.id, "BUY", 0.85, 0));
    // Barrier: once this lands, the duplicate before it has been handled.
    backend.push("new_signal", signal_json("after", "SELL", 0.6, 1));

    let state = wait_for(&mut state_rx, |s| s.signals.contains("after")).await;
    assert_eq!(state.signals.len(), 2);

    let toast = toasts.recv().await.unwrap();
    assert_eq!(toast.level, ToastLevel::Info);
    assert_eq!(toast.message, "New SELL signal (60% confidence)");

    session.shutdown().await;
}

#[tokio::test]
async fn test_malformed_pushes_are_ignored() {
    let (backend, session) = start_connected().await;
    let mut state_rx = session.subscribe();

    backend.push("price_update", price_json(97000.12, 0.5321, 3.4));
    let before = wait_for(&mut state_rx, |s| {
        s.price.as_ref().is_some_and(|p| p.market_price == Decimal::new(5321, 4))
    })
    .await
    .price;

    backend.push("price_update", serde_json::json!({ "binance_price": "abc" }));
    backend.push("price_update", serde_json::json!("not an object"));
    backend.push("new_signal", serde_json::json!({ "id": "broken" }));
    backend.push("new_signal", signal_json("too-confident", "BUY", 1.7, 2));
    backend.push_raw("42[oops");
    backend.push("something_else", serde_json::json!({}));
    backend.push("new_signal", signal_json("barrier", "BUY", 0.5, 3));

    let state = wait_for(&mut state_rx, |s| s.signals.contains("barrier")).await;
    assert_eq!(state.price, before);
    assert_eq!(state.signals.len(), 1);
    assert!(!state.signals.contains("broken"));
    assert!(!state.signals.contains("too-confident"));

    session.shutdown().await;
}

#[tokio::test]
async fn test_reconnect_after_dropped_socket_resumes_pushes() {
    let (backend, session) = start_connected().await;
    let mut state_rx = session.subscribe();
    let mut toasts = session.subscribe_toasts();

    backend.push("new_signal", signal_json("seen", "BUY", 0.8, 0));
    wait_for(&mut state_rx, |s| s.signals.contains("seen")).await;
    assert_eq!(toasts.recv().await.unwrap().message, "New BUY signal (80% confidence)");

    backend.kick_clients();
    wait_for(&mut state_rx, |s| s.connection == ConnectionStatus::Disconnected).await;
    wait_for(&mut state_rx, |s| s.connection == ConnectionStatus::Connected).await;
    backend.wait_for_client().await;

    // The server replays the signal it already sent, then a fresh price.
    backend.push("new_signal", signal_json("seen", "BUY", 0.8, 0));
    backend.push("price_update", price_json(98000.5, 0.61, 2.25));

    let state = wait_for(&mut state_rx, |s| {
        s.price.as_ref().is_some_and(|p| p.market_price == Decimal::new(61, 2))
    })
    .await;
    assert_eq!(state.connection, ConnectionStatus::Connected);
    assert_eq!(state.signals.len(), 1);
    assert!(state.signals.contains("seen"));
    assert_eq!(render_ticker(state.price.as_ref()), "BTC 98000.50 | Market 0.6100 | Delta 2.25");
    assert!(matches!(toasts.try_recv(), Err(TryRecvError::Empty)));

    session.shutdown().await;
}
