//! # Record Store
//!
//! Where vector records live. The access layer and the auditor share one
//! store through `Arc<dyn RecordStore>`.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;

use vdatabprot_core::config::StorageConfig;
use vdatabprot_core::error::Result;
use vdatabprot_core::types::{VectorId, VectorRecord};

use crate::durable::DurableMap;

pub trait RecordStore: Send + Sync {
    /// Insert or replace the record for `id`
    fn put(&self, id: &VectorId, record: VectorRecord) -> Result<()>;

    /// `Ok(None)` when nothing was ever written under `id`
    fn get(&self, id: &VectorId) -> Result<Option<VectorRecord>>;

    fn contains(&self, id: &VectorId) -> Result<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// Every record currently stored
    fn snapshot(&self) -> Result<Vec<(VectorId, VectorRecord)>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// Records persisted in `vectors.log`
pub struct LogStore {
    records: DurableMap<VectorRecord>,
}

impl LogStore {
    pub fn open(path: impl AsRef<Path>, config: &StorageConfig) -> Result<Self> {
        Ok(Self {
            records: DurableMap::open(path, config, "vectors")?,
        })
    }
}

impl RecordStore for LogStore {
    fn put(&self, id: &VectorId, record: VectorRecord) -> Result<()> {
        self.records.put(id.as_str(), record)
    }

    fn get(&self, id: &VectorId) -> Result<Option<VectorRecord>> {
        Ok(self.records.get(id.as_str()))
    }

    fn contains(&self, id: &VectorId) -> Result<bool> {
        Ok(self.records.contains_key(id.as_str()))
    }

    fn snapshot(&self) -> Result<Vec<(VectorId, VectorRecord)>> {
        Ok(self
            .records
            .snapshot()
            .into_iter()
            .map(|(key, record)| (VectorId::from(key), record))
            .collect())
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn sync(&self) -> Result<()> {
        self.records.sync()
    }
}

/// Volatile store; contents are gone when it is dropped
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<VectorId, VectorRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn put(&self, id: &VectorId, record: VectorRecord) -> Result<()> {
        self.records.write().insert(id.clone(), record);
        Ok(())
    }

    fn get(&self, id: &VectorId) -> Result<Option<VectorRecord>> {
        Ok(self.records.read().get(id).cloned())
    }

    fn snapshot(&self) -> Result<Vec<(VectorId, VectorRecord)>> {
        Ok(self
            .records
            .read()
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect())
    }

    fn len(&self) -> usize {
        self.records.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vdatabprot_core::VectorCodec;

    fn exercise(store: &dyn RecordStore) {
        let codec = VectorCodec::default();
        let a = VectorId::from("a");
        let b = VectorId::from("b");

        assert!(store.get(&a).unwrap().is_none());
        assert!(store.is_empty());

        store.put(&a, codec.encode(b"first").unwrap()).unwrap();
        store.put(&b, codec.encode(b"second").unwrap()).unwrap();
        store.put(&a, codec.encode(b"replaced").unwrap()).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.contains(&a).unwrap());
        assert!(!store.contains(&VectorId::from("c")).unwrap());
        let record = store.get(&a).unwrap().unwrap();
        assert_eq!(codec.decode(&record).unwrap(), b"replaced");

        let mut ids: Vec<_> = store.snapshot().unwrap().into_iter().map(|(id, _)| id).collect();
        ids.sort();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_log_store() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
            ..Default::default()
        };
        let store = LogStore::open(config.vectors_path(), &config).unwrap();
        exercise(&store);
        drop(store);

        let store = LogStore::open(config.vectors_path(), &config).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains(&VectorId::from("a")).unwrap());
        let record = store.get(&VectorId::from("b")).unwrap().unwrap();
        assert_eq!(VectorCodec::default().decode(&record).unwrap(), b"second");
    }
}
