//! Key-value persistence for numeric settings
//!
//! Stores are shared (`Rc<dyn KeyValueStore>`) and written from inside
//! listeners, so every method takes `&self`.
//!
//! - `MemoryStore`: in-process map, for tests and headless runs
//! - `JsonFileStore`: flat JSON object on disk, written on `save()`

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failure writing or parsing a store file
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store is not a flat JSON object of numbers: {0}")]
    Json(#[from] serde_json::Error),
}

/// String-keyed numeric storage
pub trait KeyValueStore {
    fn get_f32(&self, key: &str) -> Option<f32>;
    fn set_f32(&self, key: &str, value: f32);
    fn has_key(&self, key: &str) -> bool;

    /// Stored value, or `default` written back if the key is absent
    fn get_or_insert_f32(&self, key: &str, default: f32) -> f32 {
        match self.get_f32(key) {
            Some(value) => value,
            None => {
                self.set_f32(key, default);
                default
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<BTreeMap<String, f32>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_f32(&self, key: &str) -> Option<f32> {
        self.values.borrow().get(key).copied()
    }

    fn set_f32(&self, key: &str, value: f32) {
        self.values.borrow_mut().insert(key.to_string(), value);
    }

    fn has_key(&self, key: &str) -> bool {
        self.values.borrow().contains_key(key)
    }
}

/// Flat `{ "key": number }` JSON file
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: RefCell<BTreeMap<String, f32>>,
    dirty: Cell<bool>,
}

impl JsonFileStore {
    /// Read `path` strictly
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let json = std::fs::read_to_string(&path)?;
        let values = serde_json::from_str(&json)?;
        Ok(Self {
            path,
            values: RefCell::new(values),
            dirty: Cell::new(false),
        })
    }

    /// Read `path`, starting empty if it is missing or unreadable
    pub fn load_or_default(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::open(&path) {
            Ok(store) => {
                log::info!("Loaded {} stored value(s) from {}", store.len(), path.display());
                store
            }
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No store at {}, starting fresh", path.display());
                Self::empty(path)
            }
            Err(e) => {
                log::warn!("Ignoring store {}: {}", path.display(), e);
                Self::empty(path)
            }
        }
    }

    fn empty(path: PathBuf) -> Self {
        Self {
            path,
            values: RefCell::new(BTreeMap::new()),
            dirty: Cell::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    /// Whether there are writes not yet saved
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Write all values to disk
    pub fn save(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&*self.values.borrow())?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, json)?;
        self.dirty.set(false);
        log::debug!("Saved {} value(s) to {}", self.len(), self.path.display());
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_f32(&self, key: &str) -> Option<f32> {
        self.values.borrow().get(key).copied()
    }

    fn set_f32(&self, key: &str, value: f32) {
        self.values.borrow_mut().insert(key.to_string(), value);
        self.dirty.set(true);
    }

    fn has_key(&self, key: &str) -> bool {
        self.values.borrow().contains_key(key)
    }
}
