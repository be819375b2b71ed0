//! In-memory object store.

use super::{validate_bucket, validate_key, ObjectStore, StoreError, StoreResult};
use std::collections::BTreeMap;
use std::sync::RwLock;

type Buckets = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

/// A process-local store backed by nested ordered maps.
///
/// Cheap to create; every test that needs persistence starts from one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: RwLock<Buckets>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of keys across all buckets.
    pub fn len(&self) -> usize {
        let buckets = self.buckets.read().unwrap_or_else(|err| err.into_inner());
        buckets.values().map(BTreeMap::len).sum()
    }

    /// Returns true if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryStore {
    fn exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        let buckets = self.buckets.read().unwrap_or_else(|err| err.into_inner());
        Ok(buckets.get(bucket).is_some_and(|b| b.contains_key(key)))
    }

    fn get(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        let buckets = self.buckets.read().unwrap_or_else(|err| err.into_inner());
        buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    fn set(&self, bucket: &str, key: &str, data: &[u8]) -> StoreResult<()> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        let mut buckets = self.buckets.write().unwrap_or_else(|err| err.into_inner());
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn list_names(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<String>> {
        validate_bucket(bucket)?;
        let buckets = self.buckets.read().unwrap_or_else(|err| err.into_inner());
        Ok(buckets
            .get(bucket)
            .map(|b| {
                b.range(prefix.to_string()..)
                    .take_while(|(k, _)| k.starts_with(prefix))
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        let mut buckets = self.buckets.write().unwrap_or_else(|err| err.into_inner());
        if let Some(b) = buckets.get_mut(bucket) {
            b.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::exercise_store;
    use std::sync::Arc;

    #[test]
    fn test_memory_store_behaviour() {
        exercise_store(Arc::new(MemoryStore::new()));
    }

    #[test]
    fn test_buckets_are_isolated() {
        let store = MemoryStore::new();
        store.set("a", "k", b"1").unwrap();
        assert!(!store.exists("b", "k").unwrap());
        assert!(store.list_names("b", "").unwrap().is_empty());
        assert_eq!(store.len(), 1);
    }
}
