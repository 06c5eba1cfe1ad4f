//! Persistence Adapter - saves and restores the Draw State.
//!
//! The whole state lives in one JSON record under one fixed key. Loading
//! never fails: a record that cannot be parsed becomes the empty state,
//! and a single bad field falls back to its own default without
//! discarding the rest.
//!
//! Store failures are logged and swallowed. The in-memory state stays
//! authoritative for the running session.

use crate::config::DrawConfig;
use crate::draw_state::{DrawState, HistoryEntry};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

/// Persistence errors. None of these reach the controller.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Corrupt persisted state: {0}")]
    CorruptPersistedState(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidFieldValue { field: String, value: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl PersistError {
    fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptPersistedState(msg.into())
    }

    fn invalid(field: impl Into<String>, value: &Value) -> Self {
        Self::InvalidFieldValue {
            field: field.into(),
            value: value.to_string(),
        }
    }
}

// ============================================================================
// STORES
// ============================================================================

/// Key-value storage for the persisted record.
///
/// Implementations must be thread-safe and keep data across restarts
/// (except the in-memory store used by tests and simulation).
pub trait DrawStore: Send + Sync {
    /// Reads the raw record stored under `key`, if any.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, PersistError>;

    /// Overwrites the record stored under `key`.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), PersistError>;

    /// Deletes the record stored under `key`. Missing keys are not an error.
    fn remove(&self, key: &str) -> Result<(), PersistError>;
}

/// Sled-based persistent store.
///
/// Uses an embedded key-value database for durability.
pub struct SledDrawStore {
    db: sled::Db,
}

impl SledDrawStore {
    /// Open a persistent store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistError> {
        let db = sled::open(path)
            .map_err(|e| PersistError::Storage(format!("Failed to open sled DB: {}", e)))?;
        Ok(Self { db })
    }

    /// Create a temporary store (for testing)
    #[cfg(test)]
    pub fn open_temp() -> Result<Self, PersistError> {
        let config = sled::Config::new().temporary(true);
        let db = config
            .open()
            .map_err(|e| PersistError::Storage(format!("Failed to open temp DB: {}", e)))?;
        Ok(Self { db })
    }
}

impl DrawStore for SledDrawStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, PersistError> {
        self.db
            .get(key)
            .map(|value| value.map(|v| v.to_vec()))
            .map_err(|e| PersistError::Storage(format!("Read failed: {}", e)))
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), PersistError> {
        self.db
            .insert(key, bytes)
            .map_err(|e| PersistError::Storage(format!("Insert failed: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| PersistError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistError> {
        self.db
            .remove(key)
            .map_err(|e| PersistError::Storage(format!("Remove failed: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| PersistError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}

/// In-memory store for tests and simulation runs.
#[derive(Default)]
pub struct MemoryDrawStore {
    records: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryDrawStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>, PersistError> {
        self.records
            .lock()
            .map_err(|_| PersistError::Storage("memory store lock poisoned".to_string()))
    }
}

impl DrawStore for MemoryDrawStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, PersistError> {
        Ok(self.records()?.get(key).cloned())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), PersistError> {
        self.records()?.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistError> {
        self.records()?.remove(key);
        Ok(())
    }
}

// ============================================================================
// ADAPTER
// ============================================================================

/// Wire shape of the persisted record.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedRecord<'a> {
    drawn_winners: Vec<&'a str>,
    prize_counters: &'a IndexMap<String, u64>,
    current_prize_index: usize,
    history_log: &'a [HistoryEntry],
}

/// Saves and loads [`DrawState`] under a fixed key.
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn DrawStore>,
    key: String,
}

impl Persistence {
    pub fn new(store: Arc<dyn DrawStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Adapter over a fresh [`MemoryDrawStore`] using the config's key.
    pub fn in_memory(config: &DrawConfig) -> Self {
        Self::new(MemoryDrawStore::shared(), config.storage_key.clone())
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Best-effort save: errors are logged, never returned.
    pub fn save(&self, state: &DrawState) {
        if let Err(e) = self.try_save(state) {
            warn!(key = %self.key, "Failed to persist draw state: {}", e);
        }
    }

    /// Serializes the full state and overwrites the stored record.
    pub fn try_save(&self, state: &DrawState) -> Result<(), PersistError> {
        let record = PersistedRecord {
            drawn_winners: state.drawn_winners().iter().map(String::as_str).collect(),
            prize_counters: state.prize_counters(),
            current_prize_index: state.current_tier_index(),
            history_log: state.history(),
        };
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| PersistError::Storage(format!("Serialize failed: {}", e)))?;
        self.store.write(&self.key, &bytes)?;
        debug!(key = %self.key, bytes = bytes.len(), "Draw state saved");
        Ok(())
    }

    /// Loads the stored state, falling back to the empty state on any
    /// record-level failure.
    pub fn load(&self, config: &DrawConfig) -> DrawState {
        let state = match self.try_load(config) {
            Ok(state) => state,
            Err(e) => {
                warn!(key = %self.key, "{}; starting from empty state", e);
                DrawState::new(config)
            }
        };
        if let Err(e) = state.check_consistency(config.tier_count()) {
            warn!(key = %self.key, "Loaded draw state is inconsistent: {}", e);
        }
        state
    }

    /// Loads the stored state, reporting record-level failures.
    ///
    /// Field-level problems never fail the load; they are logged and the
    /// field takes its default.
    pub fn try_load(&self, config: &DrawConfig) -> Result<DrawState, PersistError> {
        let Some(bytes) = self.store.read(&self.key)? else {
            return Ok(DrawState::new(config));
        };
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| PersistError::corrupt(format!("unparseable record: {}", e)))?;
        sanitize(&value, config)
    }

    /// Deletes the stored record. Errors are logged.
    pub fn purge(&self) {
        if let Err(e) = self.store.remove(&self.key) {
            warn!(key = %self.key, "Failed to purge draw state: {}", e);
        }
    }
}

fn sanitize(value: &Value, config: &DrawConfig) -> Result<DrawState, PersistError> {
    let record = value
        .as_object()
        .ok_or_else(|| PersistError::corrupt("record is not an object"))?;
    let stored_winners = record
        .get("drawnWinners")
        .and_then(Value::as_array)
        .ok_or_else(|| PersistError::corrupt("drawnWinners missing or not a list"))?;

    let mut winners = IndexSet::new();
    for entry in stored_winners {
        match entry.as_str() {
            Some(name) => {
                winners.insert(name.to_string());
            }
            None => report(PersistError::invalid("drawnWinners[]", entry)),
        }
    }

    let counters = sanitize_counters(record.get("prizeCounters"), config);
    let tier_index = sanitize_tier_index(record.get("currentPrizeIndex"), config);
    let history = sanitize_history(record.get("historyLog"));

    Ok(DrawState::from_parts(winners, counters, history, tier_index))
}

/// Rebuilds counters from the configured tiers, never from stored keys.
fn sanitize_counters(stored: Option<&Value>, config: &DrawConfig) -> IndexMap<String, u64> {
    let empty = Map::new();
    let stored = match stored {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(map)) => map,
        Some(other) => {
            report(PersistError::invalid("prizeCounters", other));
            &empty
        }
    };

    config
        .tiers
        .iter()
        .map(|tier| {
            let count = match stored.get(&tier.name) {
                None => 0,
                Some(value) => parse_counter(value).unwrap_or_else(|| {
                    report(PersistError::invalid(format!("prizeCounters.{}", tier.name), value));
                    0
                }),
            };
            (tier.name.clone(), count)
        })
        .collect()
}

/// Accepts non-negative integral numbers, including `3.0`. Fractions such
/// as `1.5` are rejected rather than rounded.
fn parse_counter(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    (f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}

fn sanitize_tier_index(stored: Option<&Value>, config: &DrawConfig) -> usize {
    match stored {
        None | Some(Value::Null) => 0,
        Some(value) => match parse_counter(value) {
            Some(index) if (index as usize) < config.tier_count() => index as usize,
            _ => {
                report(PersistError::invalid("currentPrizeIndex", value));
                0
            }
        },
    }
}

fn sanitize_history(stored: Option<&Value>) -> Vec<HistoryEntry> {
    let entries = match stored {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            report(PersistError::invalid("historyLog", other));
            return Vec::new();
        }
    };

    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<HistoryEntry>(entry.clone()) {
            Ok(entry) => Some(entry),
            Err(_) => {
                report(PersistError::invalid("historyLog[]", entry));
                None
            }
        })
        .collect()
}

fn report(error: PersistError) {
    warn!("{}; using default", error);
}
