use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::frames::{decode_event, decode_packet, EventDecode, Packet, PushEvent, NAMESPACE_CONNECT, PONG};
use crate::metrics;
use crate::services::notifier::{format_signal_toast, Notifier};
use crate::state::{ConnectionStatus, StateStore};

const PING_INTERVAL: Duration = Duration::from_secs(25);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Why the inner read loop ended.
enum SessionEnd {
    Shutdown,
    Dropped,
}

/// Run the real-time listener until `shutdown` flips to true (or its sender is dropped).
///
/// Each push replaces a slice of the state, so reconnecting never duplicates anything.
/// Reconnects wait `base_delay`, doubling per failed attempt up to 60 s.
pub async fn run_ws_listener(
    ws_url: String,
    base_delay: Duration,
    store: StateStore,
    notifier: Notifier,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        store.update(|s| s.connection = ConnectionStatus::Connecting);
        tracing::info!(url = %ws_url, "Connecting to dashboard push channel...");

        let connected = tokio::select! {
            result = connect_async(ws_url.as_str()) => result,
            _ = shutdown.changed() => break,
        };

        match connected {
            Ok((ws_stream, _response)) => {
                tracing::info!("Push channel connected");
                attempt = 0;
                store.update(|s| s.connection = ConnectionStatus::Connected);

                let (mut write, mut read) = ws_stream.split();

                let mut ping_timer = interval(PING_INTERVAL);
                ping_timer.tick().await; // consume the first immediate tick

                let end = loop {
                    tokio::select! {
                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Text(text))) => {
                                    match handle_text_frame(text.as_str(), &store, &notifier) {
                                        FrameAction::Reply(reply) => {
                                            if let Err(e) = write.send(Message::Text(reply.to_string().into())).await {
                                                tracing::warn!(error = %e, "Failed to send protocol reply");
                                                break SessionEnd::Dropped;
                                            }
                                        }
                                        FrameAction::Close => {
                                            tracing::warn!("Server closed the Engine.IO session");
                                            break SessionEnd::Dropped;
                                        }
                                        FrameAction::None => {}
                                    }
                                }
                                Some(Ok(Message::Ping(data))) => {
                                    if let Err(e) = write.send(Message::Pong(data)).await {
                                        tracing::warn!(error = %e, "Failed to send pong");
                                        break SessionEnd::Dropped;
                                    }
                                }
                                Some(Ok(Message::Close(_))) => {
                                    tracing::warn!("Push channel sent close frame");
                                    break SessionEnd::Dropped;
                                }
                                Some(Ok(_)) => {} // binary, pong, raw frames
                                Some(Err(e)) => {
                                    tracing::error!(error = %e, "Push channel read error");
                                    break SessionEnd::Dropped;
                                }
                                None => {
                                    tracing::warn!("Push channel stream ended");
                                    break SessionEnd::Dropped;
                                }
                            }
                        }
                        _ = ping_timer.tick() => {
                            if let Err(e) = write.send(Message::Ping(vec![].into())).await {
                                tracing::warn!(error = %e, "Failed to send ping");
                                break SessionEnd::Dropped;
                            }
                        }
                        _ = shutdown.changed() => {
                            break SessionEnd::Shutdown;
                        }
                    }
                };

                if let SessionEnd::Shutdown = end {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Push channel connection failed");
            }
        }

        store.update(|s| s.connection = ConnectionStatus::Disconnected);

        let delay = reconnect_delay(base_delay, attempt);
        attempt = attempt.saturating_add(1);
        tracing::info!(delay_ms = delay.as_millis() as u64, attempt, "Reconnecting...");
        metrics::record_reconnect();

        tokio::select! {
            _ = sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    store.update(|s| s.connection = ConnectionStatus::Closed);
    tracing::info!("Push listener stopped");
}

/// Exponential backoff with cap.
fn reconnect_delay(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(2u32.saturating_pow(attempt))
        .unwrap_or(MAX_RECONNECT_DELAY)
        .min(MAX_RECONNECT_DELAY)
}

/// What the connection loop must do after a text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAction {
    /// Send this protocol reply.
    Reply(&'static str),
    /// The server ended the session; reconnect.
    Close,
    None,
}

/// Decode one text frame and apply any event it carries.
pub fn handle_text_frame(text: &str, store: &StateStore, notifier: &Notifier) -> FrameAction {
    match decode_packet(text) {
        Packet::Open => FrameAction::Reply(NAMESPACE_CONNECT),
        Packet::Ping => FrameAction::Reply(PONG),
        Packet::Close => FrameAction::Close,
        Packet::Connected => {
            tracing::debug!("Joined default namespace");
            FrameAction::None
        }
        Packet::Disconnected => {
            tracing::warn!("Server left the namespace");
            FrameAction::None
        }
        Packet::Error(detail) => {
            tracing::warn!(detail = %detail, "Push channel error packet");
            FrameAction::None
        }
        Packet::Event { name, payload } => {
            match decode_event(&name, payload) {
                EventDecode::Event(event) => apply_push_event(store, notifier, event),
                EventDecode::Ignored => {
                    tracing::trace!(event = %name, "Ignoring unhandled push event");
                }
                EventDecode::Malformed(reason) => {
                    metrics::record_malformed_push();
                    tracing::debug!(event = %name, reason = %reason, "Discarding malformed push payload");
                }
            }
            FrameAction::None
        }
        Packet::Pong => FrameAction::None,
        Packet::Unknown => {
            tracing::trace!(raw = %text, "Unrecognized push frame");
            FrameAction::None
        }
    }
}

/// Apply a decoded push event to the state.
pub fn apply_push_event(store: &StateStore, notifier: &Notifier, event: PushEvent) {
    match event {
        PushEvent::PriceUpdate(snapshot) => {
            metrics::record_push_event("price_update");
            tracing::debug!(
                reference = %snapshot.reference_price,
                market = %snapshot.market_price,
                delta = %snapshot.delta,
                "Price update"
            );
            store.update(|s| s.price = Some(snapshot));
        }
        PushEvent::NewSignal(signal) => {
            metrics::record_push_event("new_signal");
            let toast = format_signal_toast(&signal);
            let id = signal.id.clone();
            let inserted = store.update_if(|s| s.signals.push(signal));
            if inserted {
                tracing::info!(signal_id = %id, "New signal received");
                notifier.info(toast);
            } else {
                tracing::debug!(signal_id = %id, "Signal already in window");
            }
        }
    }
}
