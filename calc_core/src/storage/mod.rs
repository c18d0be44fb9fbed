//! # Document Storage
//!
//! Persistence collaborators for the calculation core. The core itself never
//! touches storage; callers load a [`Document`], edit it, calculate, and save.
//!
//! - [`Storage`] - load / save / clear over a single JSON slot
//! - [`MemoryStorage`] - in-process slot, used by tests and embedders
//! - [`FileStorage`] - JSON file with atomic saves and an advisory lock file
//! - [`export`] - export envelope and import with validation
//!
//! Loading always succeeds: persisted JSON is merged over
//! [`Document::sample`] so fields added since the data was written are
//! back-filled, then every non-finite numeric leaf is coerced to 0. Unreadable
//! data falls back to the sample with a warning.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::document::Document;
//! use calc_core::storage::{MemoryStorage, Storage};
//!
//! let store = MemoryStorage::new();
//! assert_eq!(store.load(), Document::sample());
//!
//! let mut doc = Document::sample();
//! doc.basic.area_sqm = 450.0;
//! store.save(&doc)?;
//! assert_eq!(store.load().basic.area_sqm, 450.0);
//!
//! assert_eq!(store.clear()?, Document::sample());
//! # Ok::<(), calc_core::errors::CalcError>(())
//! ```

pub mod export;
#[cfg(not(target_arch = "wasm32"))]
mod file;

use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::document::Document;
use crate::errors::{CalcError, CalcResult};

#[cfg(not(target_arch = "wasm32"))]
pub use file::{FileLock, FileStorage, LockInfo};

/// A single persisted document slot.
///
/// Implementors provide raw string access; `load`, `save` and `clear` are
/// shared.
pub trait Storage {
    /// Raw persisted JSON, or `None` when nothing has been saved.
    fn read_raw(&self) -> CalcResult<Option<String>>;

    fn write_raw(&self, json: &str) -> CalcResult<()>;

    fn remove_raw(&self) -> CalcResult<()>;

    /// Persisted document merged over the sample. Never fails.
    fn load(&self) -> Document {
        match self.read_raw() {
            Ok(Some(raw)) => match restore(&raw) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(error = %e, "stored document unreadable, using sample data");
                    Document::sample()
                }
            },
            Ok(None) => Document::sample(),
            Err(e) => {
                tracing::warn!(error = %e, "storage read failed, using sample data");
                Document::sample()
            }
        }
    }

    /// Persist a sanitized copy of `doc`.
    fn save(&self, doc: &Document) -> CalcResult<()> {
        let json = serde_json::to_string(&doc.sanitized())?;
        self.write_raw(&json)
    }

    /// Drop the persisted document and return the sample.
    fn clear(&self) -> CalcResult<Document> {
        self.remove_raw()?;
        Ok(Document::sample())
    }
}

/// Parse stored JSON and back-fill it from the sample.
pub fn restore(raw: &str) -> CalcResult<Document> {
    let saved: Value = serde_json::from_str(raw)?;
    let defaults = Document::sample().to_value()?;
    Document::from_value(merge_with_defaults(&saved, &defaults))
}

/// Recursively overlay `saved` on `defaults`.
///
/// Objects merge key by key. Any other saved value (scalar, array, null)
/// replaces the default at that position. A non-object `saved` at the root
/// yields `defaults` unchanged.
pub fn merge_with_defaults(saved: &Value, defaults: &Value) -> Value {
    let Value::Object(saved) = saved else {
        return defaults.clone();
    };
    let mut merged = match defaults {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    for (key, value) in saved {
        let next = match value {
            Value::Object(_) => {
                let base = merged.get(key).cloned().unwrap_or(Value::Null);
                merge_with_defaults(value, &base)
            }
            other => other.clone(),
        };
        merged.insert(key.clone(), next);
    }
    Value::Object(merged)
}

/// In-process storage slot.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-filled with raw JSON.
    pub fn with_raw(json: impl Into<String>) -> Self {
        MemoryStorage {
            slot: Mutex::new(Some(json.into())),
        }
    }

    fn slot(&self) -> CalcResult<std::sync::MutexGuard<'_, Option<String>>> {
        self.slot.lock().map_err(|_| CalcError::Internal {
            message: "memory storage lock poisoned".to_string(),
        })
    }
}

impl Storage for MemoryStorage {
    fn read_raw(&self) -> CalcResult<Option<String>> {
        Ok(self.slot()?.clone())
    }

    fn write_raw(&self, json: &str) -> CalcResult<()> {
        *self.slot()? = Some(json.to_string());
        Ok(())
    }

    fn remove_raw(&self) -> CalcResult<()> {
        *self.slot()? = None;
        Ok(())
    }
}
