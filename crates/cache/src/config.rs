//! Configuration for the local draft store.
//!
//! Selects the backing store (disk, memory or disabled), where a disk store
//! lives, and how many bytes it may hold. Configuration can be loaded from a
//! TOML file, environment variables, or built programmatically.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use storage::{DiskProvider, FixedProvider, MemoryStore, StoreProvider, UnavailableProvider};

/// Browsers typically give local storage about 5 MB per origin.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

pub const ENV_BACKEND: &str = "FORUM_CACHE_BACKEND";
pub const ENV_DIR: &str = "FORUM_CACHE_DIR";
pub const ENV_QUOTA_KB: &str = "FORUM_CACHE_QUOTA_KB";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Disk,
    Memory,
    Disabled,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disk => "disk",
            Self::Memory => "memory",
            Self::Disabled => "disabled",
        })
    }
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disk" => Ok(Self::Disk),
            "memory" => Ok(Self::Memory),
            "disabled" | "off" => Ok(Self::Disabled),
            _ => Err(ConfigError::InvalidValue(format!("backend {s:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub backend: StoreBackend,
    /// Directory for the disk backend.
    pub store_dir: PathBuf,
    /// Byte budget for stored drafts.
    pub quota_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            store_dir: Self::default_store_dir(),
            quota_bytes: DEFAULT_QUOTA_BYTES,
        }
    }
}

/// On-disk shape of the configuration. Every key is optional.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backend: Option<StoreBackend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    store_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quota_kb: Option<usize>,
}

impl CacheConfig {
    pub fn with_backend(mut self, backend: StoreBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_store_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.store_dir = path.as_ref().to_path_buf();
        self
    }

    /// Sizes past `usize::MAX` bytes saturate, which means no practical limit.
    pub fn with_quota_kb(mut self, kb: usize) -> Self {
        self.quota_bytes = kb.saturating_mul(1024);
        self
    }

    pub fn quota_kb(&self) -> usize {
        self.quota_bytes / 1024
    }

    /// Platform local data directory for stored drafts.
    ///
    /// - macOS: ~/Library/Application Support/org.Forum.forum/local-storage
    /// - Linux: ~/.local/share/forum/local-storage
    /// - Windows: %LOCALAPPDATA%\Forum\forum\data\local-storage
    pub fn default_store_dir() -> PathBuf {
        match ProjectDirs::from("org", "Forum", "forum") {
            Some(dirs) => dirs.data_local_dir().join("local-storage"),
            None => PathBuf::from("local-storage"),
        }
    }

    /// Overlay environment variables on the defaults.
    ///
    /// - `FORUM_CACHE_BACKEND`: `disk`, `memory` or `disabled`
    /// - `FORUM_CACHE_DIR`: disk store directory
    /// - `FORUM_CACHE_QUOTA_KB`: byte budget in KiB
    ///
    /// # Errors
    /// Returns an error if any variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().merge_env()
    }

    /// Overlay environment variables on this configuration.
    pub fn merge_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(val) = std::env::var(ENV_BACKEND) {
            self.backend =
                val.parse().map_err(|_| ConfigError::InvalidValue(ENV_BACKEND.to_string()))?;
        }

        if let Ok(val) = std::env::var(ENV_DIR) {
            self.store_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(ENV_QUOTA_KB) {
            let kb = val
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue(ENV_QUOTA_KB.to_string()))?;
            self.quota_bytes = kb_to_bytes(kb, ENV_QUOTA_KB)?;
        }

        Ok(self)
    }

    /// Load configuration from a TOML file.
    ///
    /// ```toml
    /// backend = "disk"
    /// store_dir = "/path/to/local-storage"
    /// quota_kb = 5120
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(toml_str)?;
        let mut config = Self::default();

        if let Some(backend) = file.backend {
            config.backend = backend;
        }
        if let Some(dir) = file.store_dir {
            config.store_dir = dir;
        }
        if let Some(kb) = file.quota_kb {
            config.quota_bytes = kb_to_bytes(kb, "quota_kb")?;
        }

        Ok(config)
    }

    /// Save configuration as TOML.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_toml()?)?;
        Ok(())
    }

    fn to_toml(&self) -> Result<String, ConfigError> {
        let file = ConfigFile {
            backend: Some(self.backend),
            store_dir: Some(self.store_dir.clone()),
            quota_kb: Some(self.quota_kb()),
        };
        Ok(toml::to_string(&file)?)
    }

    /// Build the store provider this configuration describes.
    pub fn provider(&self) -> Box<dyn StoreProvider> {
        match self.backend {
            StoreBackend::Disk => {
                Box::new(DiskProvider::new(&self.store_dir).with_quota(self.quota_bytes))
            }
            StoreBackend::Memory => {
                Box::new(FixedProvider::new(MemoryStore::with_quota(self.quota_bytes)))
            }
            StoreBackend::Disabled => {
                Box::new(UnavailableProvider::new("local storage disabled by configuration"))
            }
        }
    }
}

fn kb_to_bytes(kb: usize, key: &str) -> Result<usize, ConfigError> {
    kb.checked_mul(1024).ok_or_else(|| ConfigError::InvalidValue(key.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not encode configuration: {0}")]
    Encode(#[from] toml::ser::Error),
}
