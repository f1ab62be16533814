//! Coercion of loosely-shaped collection payloads into typed sequences.
//!
//! The backend returns collections either as a bare JSON array or wrapped in
//! an object under one of a handful of conventional keys. Anything else is
//! treated as an empty collection. Individual elements that fail to decode
//! are dropped without failing the whole collection.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Keys checked, in order, when a collection arrives wrapped in an object.
pub const COLLECTION_KEYS: &[&str] = &[
    "data",
    "items",
    "results",
    "wallets",
    "signals",
    "positions",
    "orders",
    "trades",
    "history",
    "activity",
];

/// Extract the array part of a collection payload, if there is one.
pub fn collection_items(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => COLLECTION_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Normalize a collection payload into `Vec<T>`.
pub fn normalize_collection<T: DeserializeOwned>(payload: Value) -> Vec<T> {
    let items = collection_items(payload);
    let total = items.len();

    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(error = %e, "Dropping undecodable collection element");
                None
            }
        })
        .collect();

    if decoded.len() < total {
        tracing::debug!(
            kept = decoded.len(),
            dropped = total - decoded.len(),
            "Collection partially decoded"
        );
    }
    decoded
}

/// `deserialize_with` adapter for nested collections.
pub fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.map(normalize_collection).unwrap_or_default())
}
