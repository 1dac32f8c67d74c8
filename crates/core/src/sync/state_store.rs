//! Durable client-side cache of the last sync outcome.
//!
//! State lives under five independent keys so a corrupt value only loses
//! itself. Each value is wrapped in a versioned envelope; values written
//! before the envelope existed are still read.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::result_model::{BlockRange, SyncResult};
use crate::errors::{Error, Result};

pub const SYNC_RESULTS_KEY: &str = "syncResults";
pub const SYNC_STATUS_KEY: &str = "syncStatus";
pub const BLOCK_RANGE_KEY: &str = "blockRange";
pub const SYNC_ERROR_KEY: &str = "syncError";
pub const LAST_SYNC_KEY: &str = "lastDbSync";

/// Keys owned by the sync state; `lastDbSync` is tracked separately.
pub const SYNC_STATE_KEYS: [&str; 4] = [
    SYNC_RESULTS_KEY,
    SYNC_STATUS_KEY,
    BLOCK_RANGE_KEY,
    SYNC_ERROR_KEY,
];

/// Current version of the persisted envelope.
pub const PERSISTED_STATE_VERSION: u32 = 1;

/// Minimal string key-value storage, the shape of a browser `localStorage`.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<K: KeyValueStore + ?Sized> KeyValueStore for Arc<K> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// Process-local key-value store.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::persistence("Key-value store lock is poisoned"))
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Persisted pipeline status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistedSyncStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

/// Everything the sync pipeline persists apart from the last sync time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersistedSyncState {
    pub results: Vec<SyncResult>,
    pub status: PersistedSyncStatus,
    pub block_range: Option<BlockRange>,
    pub error: Option<String>,
}

/// Storage seam for the sync pipeline.
pub trait SyncStateStore: Send + Sync {
    /// Reads every key independently; unreadable keys come back as defaults.
    fn load(&self) -> PersistedSyncState;

    /// Writes all state keys. A `None` error or block range removes its key.
    fn save(&self, state: &PersistedSyncState) -> Result<()>;

    /// Removes all state keys. The last sync time is kept.
    fn clear(&self) -> Result<()>;

    fn record_last_sync(&self, at: DateTime<Utc>) -> Result<()>;

    fn last_sync_time(&self) -> Option<DateTime<Utc>>;
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    value: T,
}

/// [`SyncStateStore`] over any [`KeyValueStore`].
#[derive(Debug)]
pub struct KeyValueSyncStateStore<K> {
    kv: K,
}

impl<K: KeyValueStore> KeyValueSyncStateStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    pub fn inner(&self) -> &K {
        &self.kv
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let encoded = serde_json::to_string(&Envelope {
            version: PERSISTED_STATE_VERSION,
            value,
        })?;
        self.kv.set(key, &encoded)
    }

    fn write_or_remove<T: Serialize>(&self, key: &str, value: Option<&T>) -> Result<()> {
        match value {
            Some(value) => self.write(key, value),
            None => self.kv.remove(key),
        }
    }

    /// Reads one key. `bare_string` accepts values that were stored as plain
    /// text rather than JSON.
    fn read<T: DeserializeOwned>(&self, key: &str, bare_string: bool) -> Option<T> {
        let raw = match self.kv.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!("Failed to read persisted sync key '{}': {}", key, err);
                return None;
            }
        };

        let value = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(mut map)) if map.contains_key("version") && map.contains_key("value") => {
                let version = map.get("version").and_then(Value::as_u64).unwrap_or(0);
                if version > u64::from(PERSISTED_STATE_VERSION) {
                    warn!(
                        "Skipping persisted sync key '{}': envelope version {} is newer than {}",
                        key, version, PERSISTED_STATE_VERSION
                    );
                    return None;
                }
                map.remove("value").unwrap_or(Value::Null)
            }
            Ok(Value::Number(_) | Value::Bool(_)) if bare_string => Value::String(raw),
            Ok(legacy) => {
                debug!("Reading un-enveloped persisted sync key '{}'", key);
                legacy
            }
            Err(err) if bare_string => {
                debug!("Reading persisted sync key '{}' as plain text ({})", key, err);
                Value::String(raw)
            }
            Err(err) => {
                warn!("Failed to parse persisted sync key '{}': {}", key, err);
                return None;
            }
        };

        match serde_json::from_value::<T>(value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!("Failed to decode persisted sync key '{}': {}", key, err);
                None
            }
        }
    }
}

impl<K: KeyValueStore> SyncStateStore for KeyValueSyncStateStore<K> {
    fn load(&self) -> PersistedSyncState {
        PersistedSyncState {
            results: self.read(SYNC_RESULTS_KEY, false).unwrap_or_default(),
            status: self.read(SYNC_STATUS_KEY, true).unwrap_or_default(),
            block_range: self.read(BLOCK_RANGE_KEY, false),
            error: self.read::<String>(SYNC_ERROR_KEY, true),
        }
    }

    fn save(&self, state: &PersistedSyncState) -> Result<()> {
        let outcomes = [
            self.write(SYNC_RESULTS_KEY, &state.results),
            self.write(SYNC_STATUS_KEY, &state.status),
            self.write_or_remove(BLOCK_RANGE_KEY, state.block_range.as_ref()),
            self.write_or_remove(SYNC_ERROR_KEY, state.error.as_ref()),
        ];
        outcomes.into_iter().collect::<Result<Vec<()>>>().map(|_| ())
    }

    fn clear(&self) -> Result<()> {
        let outcomes: Vec<Result<()>> = SYNC_STATE_KEYS
            .iter()
            .map(|key| self.kv.remove(key))
            .collect();
        outcomes.into_iter().collect::<Result<Vec<()>>>().map(|_| ())
    }

    fn record_last_sync(&self, at: DateTime<Utc>) -> Result<()> {
        self.write(LAST_SYNC_KEY, &at)
    }

    fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.read(LAST_SYNC_KEY, true)
    }
}
