//! Forum Local Cache Library
//!
//! Per-document, per-field draft storage with JSON encoding and
//! confirmation-gated restores, over whatever key-value store the runtime
//! offers.

pub mod config;
pub mod confirm;
pub mod key;
pub mod local;

pub use config::{CacheConfig, ConfigError, StoreBackend};
pub use confirm::{
    ConfirmPort, Confirmation, NoPrompt, ScriptedPrompt, TerminalPrompt, RESTORE_PROMPT,
};
pub use key::{DraftKeyDeriver, FnDeriver, KeyDeriver, KeySpec, StorageKey};
pub use local::{CacheSlot, KeyedCache};
