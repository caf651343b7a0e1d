//! A synchronous in-memory store.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::storage::{
    Bytes, ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey,
    StoreKeys, StorePrefix, WritableStorageTraits,
};

/// A synchronous in-memory store.
///
/// Used by the converter to assemble an archive before packaging. Key enumeration is in
/// lexicographic key order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data_map: Mutex<BTreeMap<StoreKey, Bytes>>,
}

impl MemoryStore {
    /// Create a new memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries in the store.
    ///
    /// # Panics
    /// Panics if the underlying mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_map.lock().unwrap().len()
    }

    /// Returns true if the store holds no entries.
    ///
    /// # Panics
    /// Panics if the underlying mutex is poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_map.lock().unwrap().is_empty()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<StoreKey, Bytes>>, StorageError> {
        self.data_map
            .lock()
            .map_err(|_| StorageError::from("memory store lock poisoned"))
    }
}

impl ReadableStorageTraits for MemoryStore {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        let data_map = self.lock()?;
        Ok(data_map.get(key).cloned())
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        let data_map = self.lock()?;
        Ok(data_map.get(key).map(|entry| entry.len() as u64))
    }
}

impl WritableStorageTraits for MemoryStore {
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError> {
        let mut data_map = self.lock()?;
        data_map.insert(key.clone(), value);
        Ok(())
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        let mut data_map = self.lock()?;
        data_map.remove(key);
        Ok(())
    }
}

impl ListableStorageTraits for MemoryStore {
    fn list(&self) -> Result<StoreKeys, StorageError> {
        let data_map = self.lock()?;
        Ok(data_map.keys().cloned().collect())
    }

    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        let data_map = self.lock()?;
        Ok(data_map
            .keys()
            .filter(|&key| key.has_prefix(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_get_set_erase() {
        let store = MemoryStore::new();
        let key = StoreKey::new("a/b").unwrap();
        assert!(store.get(&key).unwrap().is_none());
        store.set(&key, vec![0, 1, 2].into()).unwrap();
        assert_eq!(store.get(&key).unwrap().unwrap().as_ref(), &[0, 1, 2]);
        assert_eq!(store.size_key(&key).unwrap(), Some(3));
        store.set(&key, vec![3].into()).unwrap();
        assert_eq!(store.get(&key).unwrap().unwrap().as_ref(), &[3]);
        store.erase(&key).unwrap();
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn memory_store_list() {
        let store = MemoryStore::new();
        store
            .set(&StoreKey::new("b/1").unwrap(), vec![].into())
            .unwrap();
        store
            .set(&StoreKey::new("a/0").unwrap(), vec![].into())
            .unwrap();
        store
            .set(&StoreKey::new("a/1").unwrap(), vec![].into())
            .unwrap();
        assert_eq!(
            store.list().unwrap(),
            vec![
                StoreKey::new("a/0").unwrap(),
                StoreKey::new("a/1").unwrap(),
                StoreKey::new("b/1").unwrap(),
            ]
        );
        assert_eq!(
            store.list_prefix(&StorePrefix::new("a/").unwrap()).unwrap(),
            vec![StoreKey::new("a/0").unwrap(), StoreKey::new("a/1").unwrap()]
        );
    }
}
