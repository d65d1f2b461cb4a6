// src/store/storage.rs

//! Key-value storage backends.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use tracing::debug;

use crate::fs::FileSystem;
use crate::types::StorageMode;

/// Durable string storage addressed by key.
pub trait Storage: Send + Sync + Debug {
    /// `Ok(None)` when the key has never been written.
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// One file per key under a directory.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            dir: dir.into(),
            fs,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name_for(key))
    }
}

/// Keep `[A-Za-z0-9_-]`, percent-encode every other byte.
fn file_name_for(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !self.fs.is_file(&path) {
            return Ok(None);
        }
        self.fs.read_to_string(&path).map(Some)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        self.fs.write(&path, value.as_bytes())?;
        debug!(key, path = %path.display(), "stored value (file)");
        Ok(())
    }
}

/// Kept in memory only.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self
            .map
            .lock()
            .map_err(|_| anyhow!("memory storage lock poisoned"))?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self
            .map
            .lock()
            .map_err(|_| anyhow!("memory storage lock poisoned"))?;
        map.insert(key.to_string(), value.to_string());
        debug!(key, "stored value (memory)");
        Ok(())
    }
}

/// Storage backend for the configured mode.
pub fn open_storage(mode: StorageMode, dir: &Path, fs: Arc<dyn FileSystem>) -> Arc<dyn Storage> {
    match mode {
        StorageMode::File => Arc::new(FileStorage::new(dir, fs)),
        StorageMode::Memory => Arc::new(MemoryStorage::new()),
    }
}
