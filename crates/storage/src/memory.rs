//! In-process key-value store with an optional byte quota.
//!
//! Usage is measured as key bytes plus value bytes, the way browser local
//! storage accounts its budget. A write that would push usage past the quota
//! is rejected and the previous value stays in place.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::{KeyValueStore, StorageError};

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, String>,
    bytes_used: usize,
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes once `quota_bytes` would be exceeded.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self { state: Mutex::new(MemoryState::default()), quota_bytes: Some(quota_bytes) }
    }

    /// Bytes currently used (keys plus values).
    pub fn bytes_used(&self) -> usize {
        self.state.lock().map(|state| state.bytes_used).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|state| state.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StorageError> {
        self.state.lock().map_err(|_| StorageError::Unavailable("memory store lock poisoned".into()))
    }
}

fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.entries.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut state = self.lock()?;

        let needed = entry_size(key, value);
        let previous = state.entries.get(key).map(|old| entry_size(key, old)).unwrap_or(0);
        let projected = state.bytes_used - previous + needed;

        if let Some(limit) = self.quota_bytes {
            if projected > limit {
                return Err(StorageError::QuotaExceeded { key: key.to_owned(), needed, limit });
            }
        }

        state.entries.insert(key.to_owned(), value.to_owned());
        state.bytes_used = projected;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if let Some(old) = state.entries.remove(key) {
            state.bytes_used = state.bytes_used.saturating_sub(entry_size(key, &old));
        }
        Ok(())
    }
}
