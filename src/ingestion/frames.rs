use serde_json::Value;

use crate::models::{PriceSnapshot, Signal};

pub const EVENT_PRICE_UPDATE: &str = "price_update";
pub const EVENT_NEW_SIGNAL: &str = "new_signal";

/// Engine.IO pong reply.
pub const PONG: &str = "3";
/// Socket.IO connect request for the default namespace.
pub const NAMESPACE_CONNECT: &str = "40";

/// A decoded text frame from the real-time channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Engine.IO handshake (`0{...}`); the client must join the namespace.
    Open,
    /// Engine.IO close (`1`).
    Close,
    /// Engine.IO ping (`2`); the client must answer with a pong.
    Ping,
    Pong,
    /// Socket.IO namespace joined (`40...`).
    Connected,
    /// Socket.IO namespace left (`41`).
    Disconnected,
    /// Socket.IO error packet (`44...`).
    Error(String),
    /// Named event with its first argument.
    Event { name: String, payload: Value },
    /// Anything not understood.
    Unknown,
}

/// Events the synchronizer applies to its state.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    PriceUpdate(PriceSnapshot),
    NewSignal(Signal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventDecode {
    Event(PushEvent),
    /// An event this client does not handle.
    Ignored,
    /// A known event whose payload has the wrong shape.
    Malformed(String),
}

/// Decode one text frame.
///
/// Accepts Engine.IO v4 / Socket.IO v5 packets and plain JSON envelopes of
/// the form `{"type": "...", "data": {...}}` (or `"event"` in place of `"type"`).
pub fn decode_packet(text: &str) -> Packet {
    let text = text.trim();
    if text.starts_with('{') {
        return decode_envelope(text);
    }

    let mut chars = text.chars();
    match chars.next() {
        Some('0') => Packet::Open,
        Some('1') => Packet::Close,
        Some('2') => Packet::Ping,
        Some('3') => Packet::Pong,
        Some('4') => decode_socketio(chars.as_str()),
        _ => Packet::Unknown,
    }
}

/// Socket.IO packet body, after the Engine.IO `4` (message) prefix.
fn decode_socketio(body: &str) -> Packet {
    let mut chars = body.chars();
    let kind = chars.next();
    let rest = strip_namespace_and_ack(chars.as_str());

    match kind {
        Some('0') => Packet::Connected,
        Some('1') => Packet::Disconnected,
        Some('2') => decode_event_array(rest),
        Some('4') => Packet::Error(rest.to_string()),
        _ => Packet::Unknown,
    }
}

/// Drop an optional `/namespace,` prefix and an optional numeric ack id.
fn strip_namespace_and_ack(rest: &str) -> &str {
    let rest = if rest.starts_with('/') {
        rest.split_once(',').map(|(_, tail)| tail).unwrap_or("")
    } else {
        rest
    };
    rest.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn decode_event_array(rest: &str) -> Packet {
    let Ok(Value::Array(mut items)) = serde_json::from_str::<Value>(rest) else {
        return Packet::Unknown;
    };
    if items.is_empty() {
        return Packet::Unknown;
    }
    let name = match items.remove(0) {
        Value::String(name) => name,
        _ => return Packet::Unknown,
    };
    let payload = if items.is_empty() {
        Value::Null
    } else {
        items.swap_remove(0)
    };
    Packet::Event { name, payload }
}

fn decode_envelope(text: &str) -> Packet {
    let Ok(Value::Object(mut map)) = serde_json::from_str::<Value>(text) else {
        return Packet::Unknown;
    };
    let name = ["type", "event"]
        .iter()
        .find_map(|key| match map.remove(*key) {
            Some(Value::String(name)) => Some(name),
            _ => None,
        });
    match name {
        Some(name) => Packet::Event {
            name,
            payload: map.remove("data").unwrap_or(Value::Null),
        },
        None => Packet::Unknown,
    }
}

/// Turn a named event into a typed push event.
pub fn decode_event(name: &str, payload: Value) -> EventDecode {
    match name {
        EVENT_PRICE_UPDATE => match serde_json::from_value::<PriceSnapshot>(payload) {
            Ok(snapshot) => EventDecode::Event(PushEvent::PriceUpdate(snapshot)),
            Err(e) => EventDecode::Malformed(e.to_string()),
        },
        EVENT_NEW_SIGNAL => match serde_json::from_value::<Signal>(payload) {
            Ok(signal) if signal.has_valid_confidence() => {
                EventDecode::Event(PushEvent::NewSignal(signal))
            }
            Ok(signal) => EventDecode::Malformed(format!(
                "confidence {} outside [0, 1]",
                signal.confidence
            )),
            Err(e) => EventDecode::Malformed(e.to_string()),
        },
        _ => EventDecode::Ignored,
    }
}
