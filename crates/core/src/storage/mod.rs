//! Persistent key-value storage for collection snapshots and search history.
//!
//! [`KeyValueStore`] is the only seam that touches the storage medium. Everything
//! above it goes through [`StoreAdapter`], which owns the key layout and the JSON
//! encoding of what is stored under each key.

/// Directory-backed store with atomic writes.
pub mod file;
/// In-process store.
pub mod memory;

use std::{fmt, sync::Arc};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::CollectionItem;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Failures raised by a store or while encoding what goes into it.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The medium refused a read.
    #[error("failed to read `{key}`: {source}")]
    Read {
        /// Key being read.
        key: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The medium refused a write.
    #[error("failed to write `{key}`: {source}")]
    Write {
        /// Key being written.
        key: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The medium refused a removal.
    #[error("failed to remove `{key}`: {source}")]
    Remove {
        /// Key being removed.
        key: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// Stored bytes do not decode into the expected shape.
    #[error("stored value for `{key}` is corrupt: {source}")]
    Corrupt {
        /// Key holding the bad value.
        key: String,
        /// Decoder failure.
        source: serde_json::Error,
    },
    /// Value could not be encoded.
    #[error("failed to encode `{key}`: {source}")]
    Encode {
        /// Key being written.
        key: String,
        /// Encoder failure.
        source: serde_json::Error,
    },
    /// Store-specific failure that is not an I/O error.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Synchronous byte store addressed by string keys.
pub trait KeyValueStore: Send + Sync {
    /// Read the bytes under `key`, `None` if the key was never written.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    /// Replace the bytes under `key`.
    fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
    /// Delete `key`; removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Keys under which the collection and the search history live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    /// Key holding the JSON collection array.
    pub collection: String,
    /// Key holding the JSON search-history array.
    pub history: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            collection: "games".to_string(),
            history: "search-history".to_string(),
        }
    }
}

/// Typed access to a [`KeyValueStore`].
#[derive(Clone)]
pub struct StoreAdapter {
    store: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
}

impl fmt::Debug for StoreAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreAdapter")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl StoreAdapter {
    /// Wrap a store using the given key layout.
    pub fn new(store: Arc<dyn KeyValueStore>, keys: StorageKeys) -> Self {
        Self { store, keys }
    }

    /// Adapter over a fresh [`MemoryStore`] with default keys.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::default()), StorageKeys::default())
    }

    /// Key layout in use.
    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// Load the persisted collection; an unwritten key yields an empty collection.
    pub fn load_collection(&self) -> Result<Vec<CollectionItem>, StorageError> {
        Ok(self.read_json(&self.keys.collection)?.unwrap_or_default())
    }

    /// Persist a full collection snapshot, returning the number of bytes written.
    pub fn save_collection(&self, items: &[CollectionItem]) -> Result<usize, StorageError> {
        self.write_json(&self.keys.collection, items)
    }

    /// Drop the persisted collection.
    pub fn clear_collection(&self) -> Result<(), StorageError> {
        self.store.remove(&self.keys.collection)
    }

    /// Load the persisted search history, most recent first.
    pub fn load_history(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.read_json(&self.keys.history)?.unwrap_or_default())
    }

    /// Persist the search history.
    pub fn save_history(&self, history: &[String]) -> Result<(), StorageError> {
        self.write_json(&self.keys.history, history).map(|_| ())
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(bytes) = self.store.read(key)? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<usize, StorageError> {
        let bytes = serde_json::to_vec(value).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.store.write(key, &bytes)?;
        debug!(key, bytes = bytes.len(), "wrote store entry");
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, ItemDraft, Platform};
    use chrono::Utc;

    #[test]
    fn missing_keys_load_as_empty() -> Result<(), StorageError> {
        let adapter = StoreAdapter::in_memory();
        assert!(adapter.load_collection()?.is_empty());
        assert!(adapter.load_history()?.is_empty());
        Ok(())
    }

    #[test]
    fn collection_and_history_use_separate_keys() -> Result<(), StorageError> {
        let store = Arc::new(MemoryStore::default());
        let adapter = StoreAdapter::new(store.clone(), StorageKeys::default());
        let item = CollectionItem::from_draft(
            ItemDraft::new("Outer Wilds", [Category::Adventure], [Platform::Pc]),
            Utc::now(),
        )
        .expect("valid draft");

        adapter.save_collection(std::slice::from_ref(&item))?;
        adapter.save_history(&["outer".to_string()])?;

        assert_eq!(adapter.load_collection()?, vec![item]);
        assert_eq!(adapter.load_history()?, vec!["outer".to_string()]);
        assert!(store.read("games")?.is_some());
        assert!(store.read("search-history")?.is_some());

        adapter.clear_collection()?;
        assert!(adapter.load_collection()?.is_empty());
        assert_eq!(adapter.load_history()?.len(), 1);
        Ok(())
    }

    #[test]
    fn corrupt_values_are_reported() -> Result<(), StorageError> {
        let store = Arc::new(MemoryStore::default());
        store.write("games", b"{not json")?;
        let adapter = StoreAdapter::new(store, StorageKeys::default());
        assert!(matches!(
            adapter.load_collection(),
            Err(StorageError::Corrupt { .. })
        ));
        Ok(())
    }
}
