//! The `put_data`/`get_data` boundary.
//!
//! `navigator-effects` does not depend on `navigator-registry`; the
//! embedder supplies a [`DataStore`] that closes over the instance's
//! shard lock.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::error::EffectError;

pub trait DataStore: Send + Sync {
    fn get_data(&self, key: &str) -> Result<Option<Value>, EffectError>;
    fn put_data(&self, key: &str, value: Value) -> Result<(), EffectError>;
}

/// A plain in-memory `DataStore`, used by tests and by embedders that do
/// not need cross-process durability for effect-local bindings.
#[derive(Debug, Default)]
pub struct InMemoryDataStore {
    inner: Mutex<HashMap<String, Value>>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(initial: HashMap<String, Value>) -> Self {
        Self {
            inner: Mutex::new(initial),
        }
    }
}

impl DataStore for InMemoryDataStore {
    fn get_data(&self, key: &str) -> Result<Option<Value>, EffectError> {
        Ok(self.inner.lock().expect("data store lock poisoned").get(key).cloned())
    }

    fn put_data(&self, key: &str, value: Value) -> Result<(), EffectError> {
        self.inner.lock().expect("data store lock poisoned").insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let store = InMemoryDataStore::new();
        store.put_data("k", serde_json::json!(42)).unwrap();
        assert_eq!(store.get_data("k").unwrap(), Some(serde_json::json!(42)));
    }

    #[test]
    fn get_unbound_key_is_none() {
        let store = InMemoryDataStore::new();
        assert_eq!(store.get_data("missing").unwrap(), None);
    }
}
