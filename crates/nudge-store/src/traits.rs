//! Store trait definitions

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::StoreResult;

/// String key-value persistence
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// Read a JSON-encoded value
pub fn get_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> StoreResult<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Write a value as JSON
pub fn set_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> StoreResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}
