//! Key-value storage backend. The trait mirrors a browser-local store:
//! `get` and `set` never fail to the caller, corrupt payloads resolve to
//! `None`, and write failures are silently dropped (best-effort
//! durability).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// Store key for the page-view history.
pub const PAGE_VIEWS_KEY: &str = "edkt_page_views";
/// Store key for the matched-audience map.
pub const MATCHED_AUDIENCES_KEY: &str = "edkt_matched_audiences";

/// A generic get/set-by-key store with best-effort durability.
pub trait StorageBackend: Send + Sync {
    /// Parsed value under `key`, or `None` when absent or corrupt.
    fn get(&self, key: &str) -> Option<serde_json::Value>;
    /// Persist `value` under `key`; failures are swallowed.
    fn set(&self, key: &str, value: serde_json::Value);
}

/// Deserialize the value under `key`, falling back to `default` on a
/// missing or malformed payload. The fallback is logged so a host can hook
/// observability onto storage degradation.
pub fn get_or_default<T: DeserializeOwned>(
    backend: &dyn StorageBackend,
    key: &str,
    default: T,
) -> T {
    let Some(value) = backend.get(key) else {
        return default;
    };
    match serde_json::from_value(value) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(key, %err, "discarding malformed stored value");
            default
        }
    }
}

/// Serialize and persist `value` under `key`; serialization failure is
/// logged and dropped.
pub fn set_value<T: Serialize>(backend: &dyn StorageBackend, key: &str, value: &T) {
    match serde_json::to_value(value) {
        Ok(serialized) => backend.set(key, serialized),
        Err(err) => warn!(key, %err, "failed to serialize value for storage"),
    }
}

/// In-memory reference backend. Values are kept as serialized JSON strings,
/// matching the localStorage-style stores this engine targets; it doubles
/// as the test backend.
#[derive(Default)]
pub struct InMemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Raw serialized payload under `key`, for inspection in tests.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Overwrite the raw payload under `key`, bypassing serialization.
    pub fn put_raw(&self, key: &str, payload: &str) {
        self.entries.write().insert(key.to_string(), payload.to_string());
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl StorageBackend for InMemoryStorage {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.read();
        let raw = entries.get(key)?;
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, %err, "corrupt stored payload");
                None
            }
        }
    }

    fn set(&self, key: &str, value: serde_json::Value) {
        self.entries.write().insert(key.to_string(), value.to_string());
    }
}
