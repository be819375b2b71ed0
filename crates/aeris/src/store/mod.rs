//! Object store collaborator.
//!
//! Everything the crate persists is a blob under a string key inside a named
//! bucket. The [`ObjectStore`] trait is the seam to the storage backend;
//! [`MemoryStore`] and [`LocalStore`] implement it for tests and for a local
//! directory tree. [`Bucket`] binds a store handle to one bucket name and adds
//! typed JSON helpers.
//!
//! Keys are `/`-separated paths. Components must be non-empty and must not
//! start with `.`, so keys map safely onto file names.

pub mod keys;
mod local;
mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Result type for object store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by object store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key does not exist in the bucket.
    #[error("Key not found: {bucket}/{key}")]
    NotFound {
        /// Bucket name.
        bucket: String,
        /// Missing key.
        key: String,
    },

    /// The key or bucket name cannot be stored.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Backend I/O failure.
    #[error("Store I/O error: {0}")]
    Io(#[from] io::Error),

    /// A JSON document could not be encoded or decoded.
    #[error("Store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Blob storage with bucket semantics.
///
/// Implementations must be safe to share between threads. `delete` of a
/// missing key succeeds; `get` of a missing key fails with
/// [`StoreError::NotFound`].
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Returns true if `key` exists.
    fn exists(&self, bucket: &str, key: &str) -> StoreResult<bool>;

    /// Reads the blob stored under `key`.
    fn get(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>>;

    /// Stores `data` under `key`, replacing any previous blob.
    fn set(&self, bucket: &str, key: &str, data: &[u8]) -> StoreResult<()>;

    /// Lists all keys starting with `prefix`, sorted.
    fn list_names(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<String>>;

    /// Removes `key`. Missing keys are not an error.
    fn delete(&self, bucket: &str, key: &str) -> StoreResult<()>;

    /// Reads and parses a JSON document.
    fn get_json(&self, bucket: &str, key: &str) -> StoreResult<serde_json::Value> {
        Ok(serde_json::from_slice(&self.get(bucket, key)?)?)
    }

    /// Serializes and stores a JSON document.
    fn set_json(&self, bucket: &str, key: &str, value: &serde_json::Value) -> StoreResult<()> {
        self.set(bucket, key, &serde_json::to_vec(value)?)
    }

    /// Uploads the contents of a local file.
    fn set_from_file(&self, bucket: &str, key: &str, path: &Path) -> StoreResult<()> {
        let data = std::fs::read(path)?;
        self.set(bucket, key, &data)
    }
}

/// Checks that `key` is a relative `/`-separated path of plain components.
pub fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey("empty key".to_string()));
    }
    if key.contains('\\') || key.contains('\0') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    if key
        .split('/')
        .any(|part| part.is_empty() || part.starts_with('.'))
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn validate_bucket(bucket: &str) -> StoreResult<()> {
    if bucket.contains('/') {
        return Err(StoreError::InvalidKey(format!("bucket {bucket}")));
    }
    validate_key(bucket)
}

/// A store handle bound to one bucket.
///
/// # Examples
/// ```rust,ignore
/// use alopex_aeris::store::{Bucket, MemoryStore};
/// use std::sync::Arc;
///
/// let bucket = Bucket::new(Arc::new(MemoryStore::new()), "obs");
/// bucket.set("a/b", b"payload")?;
/// ```
#[derive(Clone)]
pub struct Bucket {
    store: Arc<dyn ObjectStore>,
    name: String,
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("name", &self.name)
            .field("store", &self.store)
            .finish()
    }
}

impl Bucket {
    /// Binds `store` to the bucket `name`.
    pub fn new(store: Arc<dyn ObjectStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    /// Creates a bucket over a fresh [`MemoryStore`].
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), name)
    }

    /// Bucket name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Returns true if `key` exists.
    pub fn exists(&self, key: &str) -> StoreResult<bool> {
        self.store.exists(&self.name, key)
    }

    /// Reads a blob.
    pub fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.store.get(&self.name, key)
    }

    /// Writes a blob.
    pub fn set(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        self.store.set(&self.name, key, data)
    }

    /// Uploads a local file.
    pub fn set_from_file(&self, key: &str, path: &Path) -> StoreResult<()> {
        self.store.set_from_file(&self.name, key, path)
    }

    /// Lists keys under `prefix`, sorted.
    pub fn list_names(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.store.list_names(&self.name, prefix)
    }

    /// Deletes a key.
    pub fn delete(&self, key: &str) -> StoreResult<()> {
        self.store.delete(&self.name, key)
    }

    /// Reads a JSON document into `T`.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<T> {
        Ok(serde_json::from_value(self.store.get_json(&self.name, key)?)?)
    }

    /// Reads the `revision` field of a stored JSON document, or `None` if the
    /// key does not exist. Documents without the field count as revision 0.
    pub fn revision_of(&self, key: &str) -> StoreResult<Option<u64>> {
        #[derive(Deserialize)]
        struct Revisioned {
            #[serde(default)]
            revision: u64,
        }

        match self.get(key) {
            Ok(bytes) => Ok(Some(serde_json::from_slice::<Revisioned>(&bytes)?.revision)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Writes `value` as a JSON document.
    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        self.store
            .set_json(&self.name, key, &serde_json::to_value(value)?)
    }
}
