//! Keyed local cache for in-progress edits.
//!
//! Each slot is addressed by (document, field, prefix). Values are stored as
//! JSON strings. The cache is a convenience: no operation here ever fails
//! toward the caller. A missing store, a full store, or a corrupt entry all
//! degrade to "nothing saved" plus a logged warning.

use serde::de::DeserializeOwned;
use serde::Serialize;
use storage::{acquire_store, KeyValueStore, StorageError, StoreProvider};

use crate::config::CacheConfig;
use crate::confirm::{ConfirmPort, Confirmation, NoPrompt, RESTORE_PROMPT};
use crate::key::{KeyDeriver, StorageKey};

#[derive(Debug, thiserror::Error)]
enum CacheError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &StorageKey,
) -> Result<Option<T>, CacheError> {
    let Some(raw) = store.get_item(key.as_str())? else {
        return Ok(None);
    };
    // A stored `null` is the same as nothing stored.
    Ok(serde_json::from_str::<Option<T>>(&raw)?)
}

fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &StorageKey,
    state: &T,
) -> Result<(), CacheError> {
    let json = serde_json::to_string(state)?;
    store.set_item(key.as_str(), &json)?;
    Ok(())
}

/// Per-document, per-field draft storage over a [`StoreProvider`].
pub struct KeyedCache<K: KeyDeriver> {
    provider: Box<dyn StoreProvider>,
    deriver: K,
    prompt: Box<dyn ConfirmPort>,
}

impl<K: KeyDeriver> KeyedCache<K> {
    /// Create a cache with no interactive user; verified restores return `None`.
    pub fn new(provider: impl StoreProvider + 'static, deriver: K) -> Self {
        Self::from_boxed(Box::new(provider), deriver)
    }

    pub fn from_boxed(provider: Box<dyn StoreProvider>, deriver: K) -> Self {
        Self { provider, deriver, prompt: Box::new(NoPrompt) }
    }

    pub fn from_config(config: &CacheConfig, deriver: K) -> Self {
        Self::from_boxed(config.provider(), deriver)
    }

    /// Use `prompt` to confirm restores of verified slots.
    pub fn with_prompt(mut self, prompt: impl ConfirmPort + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    /// The storage key for a slot and whether restoring it needs confirmation.
    pub fn key_for(&self, doc: &K::Doc, name: &str, prefix: &str) -> (StorageKey, bool) {
        let spec = self.deriver.derive(doc, name);
        (StorageKey::new(prefix, &spec.id), spec.verify)
    }

    /// Bind a slot so callers can pass one value around instead of three.
    pub fn slot<'a>(
        &'a self,
        doc: &'a K::Doc,
        name: &'a str,
        prefix: &'a str,
    ) -> CacheSlot<'a, K> {
        CacheSlot { cache: self, doc, name, prefix }
    }

    /// Read the saved value for a slot.
    ///
    /// Returns `None` when the store is unavailable, nothing (or JSON `null`)
    /// is stored, the stored text is not valid JSON for `T`, or the slot
    /// needs verification and the user did not accept the restore. The user
    /// is only asked when a value actually exists.
    pub fn get<T: DeserializeOwned>(&self, doc: &K::Doc, name: &str, prefix: &str) -> Option<T> {
        let store = acquire_store(self.provider.as_ref())?;
        let (key, verify) = self.key_for(doc, name, prefix);

        let saved = match read_json::<T>(store.as_ref(), &key) {
            Ok(saved) => saved,
            Err(error) => {
                tracing::warn!(%key, %error, "failed reading from local storage");
                return None;
            }
        };

        let Some(saved) = saved else {
            tracing::debug!(%key, "no saved state");
            return None;
        };

        if !verify {
            return Some(saved);
        }

        match self.prompt.confirm(RESTORE_PROMPT) {
            Confirmation::Accepted => Some(saved),
            Confirmation::Declined => {
                tracing::debug!(%key, "restore declined");
                None
            }
            Confirmation::Unavailable => {
                tracing::debug!(%key, "restore needs confirmation but no prompt is available");
                None
            }
        }
    }

    /// Save `state` into a slot. Returns whether the write happened.
    pub fn set<T: Serialize + ?Sized>(
        &self,
        state: &T,
        doc: &K::Doc,
        name: &str,
        prefix: &str,
    ) -> bool {
        let Some(store) = acquire_store(self.provider.as_ref()) else {
            return false;
        };
        let (key, _) = self.key_for(doc, name, prefix);

        match write_json(store.as_ref(), &key, state) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(%key, %error, "failed writing to local storage");
                false
            }
        }
    }

    /// Forget whatever is saved in a slot.
    pub fn reset(&self, doc: &K::Doc, name: &str, prefix: &str) {
        let Some(store) = acquire_store(self.provider.as_ref()) else {
            return;
        };
        let (key, _) = self.key_for(doc, name, prefix);

        if let Err(error) = store.remove_item(key.as_str()) {
            tracing::warn!(%key, %error, "failed clearing local storage");
        }
    }
}

/// One (document, field, prefix) slot of a [`KeyedCache`].
pub struct CacheSlot<'a, K: KeyDeriver> {
    cache: &'a KeyedCache<K>,
    doc: &'a K::Doc,
    name: &'a str,
    prefix: &'a str,
}

impl<K: KeyDeriver> CacheSlot<'_, K> {
    pub fn key(&self) -> StorageKey {
        self.cache.key_for(self.doc, self.name, self.prefix).0
    }

    pub fn get<T: DeserializeOwned>(&self) -> Option<T> {
        self.cache.get(self.doc, self.name, self.prefix)
    }

    pub fn set<T: Serialize + ?Sized>(&self, state: &T) -> bool {
        self.cache.set(state, self.doc, self.name, self.prefix)
    }

    pub fn reset(&self) {
        self.cache.reset(self.doc, self.name, self.prefix)
    }
}
