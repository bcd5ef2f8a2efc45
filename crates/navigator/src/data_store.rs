//! The `DataStore` an entry-effect tree runs against.
//!
//! `navigator-effects` has no knowledge of the registry; this adapter
//! seeds a buffer from the instance's data at dispatch time and the
//! caller flushes it back via [`RegistryDataStore::snapshot`] once the
//! effect tree finishes, merging it into the instance under the
//! registry's normal shard-locked `update`.

use std::sync::Mutex;

use navigator_effects::{DataStore, EffectError};
use navigator_types::FsmData;
use serde_json::Value;

pub struct RegistryDataStore {
    buffer: Mutex<FsmData>,
}

impl RegistryDataStore {
    pub fn seeded(initial: FsmData) -> Self {
        Self { buffer: Mutex::new(initial) }
    }

    pub fn snapshot(&self) -> FsmData {
        self.buffer.lock().expect("data store lock poisoned").clone()
    }
}

impl DataStore for RegistryDataStore {
    fn get_data(&self, key: &str) -> Result<Option<Value>, EffectError> {
        Ok(self.buffer.lock().expect("data store lock poisoned").get(key).cloned())
    }

    fn put_data(&self, key: &str, value: Value) -> Result<(), EffectError> {
        self.buffer.lock().expect("data store lock poisoned").insert(key.to_string(), value);
        Ok(())
    }
}
