//! Capacity-constrained key-value backends for the cache.
//!
//! A backend stores opaque string values under string keys and reports
//! [`Error::StorageQuotaExceeded`] when a write would push it past its byte
//! quota. Writes to the same key replace the previous value.

use crate::error::{Error, Result};
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// A string key-value store with a byte quota.
pub trait KvStore: Send + Sync {
    /// Reads a value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Deletes a value. Missing keys are not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// All keys currently stored.
    fn keys(&self) -> Result<Vec<String>>;
}

fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

/// In-memory store. With a quota, the sum of key and value lengths is bounded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<FxHashMap<String, String>>,
    capacity_bytes: Option<usize>,
}

impl MemoryStore {
    /// Unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes past `capacity_bytes`.
    pub fn with_capacity(capacity_bytes: usize) -> Self {
        Self {
            entries: RwLock::default(),
            capacity_bytes: Some(capacity_bytes),
        }
    }

    /// Bytes currently used.
    pub fn used_bytes(&self) -> usize {
        self.entries
            .read()
            .map(|entries| entries.iter().map(|(k, v)| entry_size(k, v)).sum())
            .unwrap_or(0)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::storage("memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::storage("memory store lock poisoned"))?;

        if let Some(capacity) = self.capacity_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| entry_size(k, v))
                .sum();
            let bytes = entry_size(key, value);
            if used + bytes > capacity {
                return Err(Error::StorageQuotaExceeded {
                    key: key.to_string(),
                    bytes,
                });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .write()
            .map_err(|_| Error::storage("memory store lock poisoned"))?
            .remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::storage("memory store lock poisoned"))?;
        Ok(entries.keys().cloned().collect())
    }
}

/// Directory-backed store, one file per key.
///
/// Keys are percent-encoded into file names so any key round-trips.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    capacity_bytes: Option<usize>,
}

impl FileStore {
    /// Opens (and creates) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>, capacity_bytes: Option<usize>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            capacity_bytes,
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_key(key)))
    }

    /// Bytes used by every key other than `key`, counted like [`MemoryStore`].
    fn used_bytes_excluding(&self, key: &str) -> Result<usize> {
        let mut used = 0;
        for other in self.keys()? {
            if other == key {
                continue;
            }
            let value_len = fs::metadata(self.path_for(&other))?.len() as usize;
            used += other.len() + value_len;
        }
        Ok(used)
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Some(capacity) = self.capacity_bytes {
            let used = self.used_bytes_excluding(key)?;
            let bytes = entry_size(key, value);
            if used + bytes > capacity {
                return Err(Error::StorageQuotaExceeded {
                    key: key.to_string(),
                    bytes,
                });
            }
        }

        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if let Some(key) = decode_key(stem) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'-' | b'.' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn decode_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
