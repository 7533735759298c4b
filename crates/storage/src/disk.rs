//! Directory-backed key-value store.
//!
//! Each key is one file under the root directory. File names are the hex
//! encoding of the key bytes, so arbitrary keys (slashes, colons, unicode)
//! map to safe names. Keys too long for that get a SHA-256 file name instead,
//! and the file's first line records which key owns it. Writes land in a
//! uniquely named temporary file first and are renamed into place, so
//! readers never see a half-written value.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::{KeyValueStore, StorageError};

const VALUE_EXTENSION: &str = "json";
/// Longest hex file stem; most filesystems cap a name at 255 bytes.
const MAX_HEX_NAME: usize = 200;
/// Hashed names start with a non-hex character so they never meet a hex name.
const HASHED_NAME_PREFIX: char = 'h';

/// Persistent store rooted at a directory.
#[derive(Debug)]
pub struct DiskStore {
    root: PathBuf,
    quota_bytes: Option<usize>,
    /// Serialises writers so the quota check and the write are one step.
    write_lock: Mutex<()>,
}

/// Where a key lives on disk.
struct Location {
    path: PathBuf,
    /// Hex of the key, stored as the first line of a hashed entry.
    owner: Option<String>,
}

impl Location {
    fn encode(&self, value: &str) -> String {
        match &self.owner {
            Some(owner) => format!("{owner}\n{value}"),
            None => value.to_owned(),
        }
    }

    /// Split a file's contents into (owning key hex, value).
    fn decode<'a>(&self, contents: &'a str) -> Result<(Option<&'a str>, &'a str), StorageError> {
        if self.owner.is_none() {
            return Ok((None, contents));
        }
        match contents.split_once('\n') {
            Some((owner, value)) => Ok((Some(owner), value)),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} has no owner line", self.path.display()),
            )
            .into()),
        }
    }

    fn is_owned_by_other(&self, stored_owner: Option<&str>) -> bool {
        self.owner.as_deref() != stored_owner
    }
}

impl DiskStore {
    /// Open a store at `root`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        Ok(Self { root, quota_bytes: None, write_lock: Mutex::new(()) })
    }

    /// Reject writes that would grow the stored files past `quota_bytes`.
    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    fn locate(&self, key: &str) -> Location {
        let hex_key = hex::encode(key.as_bytes());
        if hex_key.len() <= MAX_HEX_NAME {
            let path = self.root.join(format!("{hex_key}.{VALUE_EXTENSION}"));
            return Location { path, owner: None };
        }

        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        let path = self.root.join(format!("{HASHED_NAME_PREFIX}{digest}.{VALUE_EXTENSION}"));
        Location { path, owner: Some(hex_key) }
    }

    fn read_file(path: &Path) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Total size of stored files, found by scanning the directory.
    pub fn bytes_used(&self) -> io::Result<usize> {
        let mut total = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(VALUE_EXTENSION) {
                total += entry.metadata()?.len() as usize;
            }
        }
        Ok(total)
    }
}

impl KeyValueStore for DiskStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let location = self.locate(key);
        let Some(contents) = Self::read_file(&location.path)? else {
            return Ok(None);
        };

        let (owner, value) = location.decode(&contents)?;
        if location.is_owned_by_other(owner) {
            return Ok(None);
        }
        Ok(Some(value.to_owned()))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::Unavailable("disk store lock poisoned".to_owned()))?;

        let location = self.locate(key);
        let existing = Self::read_file(&location.path)?;
        if let Some(existing) = &existing {
            let (owner, _) = location.decode(existing)?;
            if location.is_owned_by_other(owner) {
                return Err(StorageError::KeyCollision { key: key.to_owned() });
            }
        }

        let contents = location.encode(value);
        if let Some(limit) = self.quota_bytes {
            let needed = contents.len();
            let replaced = existing.as_ref().map_or(0, String::len);
            let projected = self.bytes_used()?.saturating_sub(replaced) + needed;
            if projected > limit {
                return Err(StorageError::QuotaExceeded { key: key.to_owned(), needed, limit });
            }
        }

        let mut temp = NamedTempFile::new_in(&self.root)?;
        temp.write_all(contents.as_bytes())?;
        temp.persist(&location.path).map_err(|e| e.error)?;

        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let location = self.locate(key);
        if location.owner.is_some() {
            if let Some(contents) = Self::read_file(&location.path)? {
                let (owner, _) = location.decode(&contents)?;
                if location.is_owned_by_other(owner) {
                    return Ok(());
                }
            }
        }

        match fs::remove_file(&location.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
