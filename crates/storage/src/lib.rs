//! Key-value string stores used for browser-style local persistence.
//!
//! A store holds raw strings. Encoding (JSON) is the caller's concern, which
//! keeps this crate free of any value format. Stores may be missing or broken
//! at runtime, so access goes through a [`StoreProvider`] and
//! [`acquire_store`], which turns every acquisition failure into `None` plus
//! one logged warning.

pub mod disk;
pub mod memory;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub use disk::DiskStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("quota exceeded writing {key:?}: needs {needed} bytes, limit is {limit}")]
    QuotaExceeded { key: String, needed: usize, limit: usize },
    #[error("{key:?} maps to a file owned by another key")]
    KeyCollision { key: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw string storage addressed by key.
///
/// Methods take `&self`; implementations synchronise internally so one handle
/// can be shared by every caller.
pub trait KeyValueStore: Send + Sync {
    /// Read the value at `key`. `Ok(None)` means nothing is stored there.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` at `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key succeeds.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

pub type StoreHandle = Arc<dyn KeyValueStore>;

/// Hands out the runtime's store, or explains why there isn't one.
pub trait StoreProvider: Send + Sync {
    fn acquire(&self) -> Result<StoreHandle, StorageError>;
}

/// Try to obtain a store handle.
///
/// A failed acquisition is logged once and reported as `None`; callers treat
/// that as "nothing stored" on reads and "not saved" on writes.
pub fn acquire_store(provider: &dyn StoreProvider) -> Option<StoreHandle> {
    match provider.acquire() {
        Ok(handle) => Some(handle),
        Err(error) => {
            tracing::warn!(%error, "local storage is unavailable; drafts will not be autosaved");
            None
        }
    }
}

/// Always returns the same store.
#[derive(Clone)]
pub struct FixedProvider {
    handle: StoreHandle,
}

impl FixedProvider {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self { handle: Arc::new(store) }
    }

    pub fn handle(&self) -> StoreHandle {
        Arc::clone(&self.handle)
    }
}

impl StoreProvider for FixedProvider {
    fn acquire(&self) -> Result<StoreHandle, StorageError> {
        Ok(Arc::clone(&self.handle))
    }
}

/// A store that is disabled or absent in this runtime.
#[derive(Debug, Clone)]
pub struct UnavailableProvider {
    reason: String,
}

impl UnavailableProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl StoreProvider for UnavailableProvider {
    fn acquire(&self) -> Result<StoreHandle, StorageError> {
        Err(StorageError::Unavailable(self.reason.clone()))
    }
}

/// Opens a [`DiskStore`] under `root`, creating the directory on first use.
///
/// The store is kept after the first successful acquisition. A failed
/// acquisition is retried next time.
pub struct DiskProvider {
    root: PathBuf,
    quota_bytes: Option<usize>,
    store: Mutex<Option<StoreHandle>>,
}

impl DiskProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), quota_bytes: None, store: Mutex::new(None) }
    }

    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }
}

impl StoreProvider for DiskProvider {
    fn acquire(&self) -> Result<StoreHandle, StorageError> {
        let mut slot = self
            .store
            .lock()
            .map_err(|_| StorageError::Unavailable("disk store lock poisoned".to_owned()))?;

        if let Some(handle) = slot.as_ref() {
            return Ok(Arc::clone(handle));
        }

        let mut store = DiskStore::open(&self.root)?;
        if let Some(quota) = self.quota_bytes {
            store = store.with_quota(quota);
        }

        let handle: StoreHandle = Arc::new(store);
        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn with_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        (result, text)
    }

    #[test]
    fn each_failed_acquisition_warns_once() {
        let provider = UnavailableProvider::new("disabled by user");

        let (acquired, logs) = with_logs(|| {
            [acquire_store(&provider).is_none(), acquire_store(&provider).is_none()]
        });
        assert_eq!(acquired, [true, true]);
        assert_eq!(logs.matches("local storage is unavailable").count(), 2);
        assert_eq!(logs.matches("WARN").count(), 2);
        assert!(logs.contains("disabled by user"));
    }

    #[test]
    fn successful_acquisition_is_silent() {
        let provider = FixedProvider::new(MemoryStore::new());
        let (acquired, logs) = with_logs(|| acquire_store(&provider).is_some());
        assert!(acquired);
        assert!(logs.is_empty());
    }

    #[test]
    fn fixed_provider_shares_one_store() {
        let provider = FixedProvider::new(MemoryStore::new());

        let first = acquire_store(&provider).expect("store should be available");
        first.set_item("k", "v").expect("write should succeed");

        let second = acquire_store(&provider).expect("store should be available");
        assert_eq!(second.get_item("k").expect("read should succeed"), Some("v".to_owned()));
    }

    #[test]
    fn unavailable_provider_yields_none() {
        let provider = UnavailableProvider::new("disabled by user");

        assert!(matches!(provider.acquire(), Err(StorageError::Unavailable(_))));
        assert!(acquire_store(&provider).is_none());
    }

    #[test]
    fn disk_provider_creates_root_lazily() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let root = temp.path().join("nested").join("local-storage");
        let provider = DiskProvider::new(&root);

        assert!(!root.exists());
        let handle = acquire_store(&provider).expect("store should be available");
        assert!(root.is_dir());

        handle.set_item("draft", "{}").expect("write should succeed");
        let again = acquire_store(&provider).expect("store should be available");
        assert_eq!(again.get_item("draft").expect("read should succeed"), Some("{}".to_owned()));
    }

    #[test]
    fn disk_provider_is_unavailable_when_root_is_a_file() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let blocker = temp.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").expect("blocker file should be written");

        let provider = DiskProvider::new(blocker.join("local-storage"));
        assert!(acquire_store(&provider).is_none());
    }
}
