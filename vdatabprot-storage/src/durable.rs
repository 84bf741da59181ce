//! # Durable Map
//!
//! A `DashMap` index rebuilt from a [`RecordLog`] on open. Every mutation is
//! appended to the log before it becomes visible in the index, and both
//! happen while the key's shard is locked, so concurrent writers to one key
//! land in the log in the same order they land in the index.

use std::collections::HashMap;
use std::path::Path;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use vdatabprot_core::config::StorageConfig;
use vdatabprot_core::error::{Error, Result};

use crate::record_log::{LogConfig, RecordLog};

pub struct DurableMap<V> {
    name: &'static str,
    index: DashMap<String, V>,
    log: Mutex<RecordLog>,
}

impl<V> DurableMap<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    pub fn open(path: impl AsRef<Path>, config: &StorageConfig, name: &'static str) -> Result<Self> {
        let path = path.as_ref();
        let (mut log, entries) = RecordLog::open(
            path,
            LogConfig {
                sync_on_write: config.sync_writes,
            },
        )?;

        let total = entries.len();
        let mut latest: HashMap<String, V> = HashMap::with_capacity(total);
        for entry in entries {
            match decode::<V>(&entry.data) {
                Ok((key, value)) => {
                    latest.insert(key, value);
                }
                Err(e) => {
                    warn!(map = name, sequence = entry.sequence, error = %e, "Skipping undecodable entry");
                }
            }
        }

        let live = latest.len();
        let dead = total - live;
        if config.compact_on_open && dead >= config.compaction_min_dead && dead > live {
            let payloads = latest
                .iter()
                .map(|(key, value)| encode(key, value))
                .collect::<Result<Vec<_>>>()?;
            log.rewrite(payloads)?;
            info!(map = name, live, dead, "Compacted record log");
        }

        let index = DashMap::with_capacity(live);
        for (key, value) in latest {
            index.insert(key, value);
        }

        debug!(map = name, path = ?path, live, "Opened durable map");

        Ok(Self {
            name,
            index,
            log: Mutex::new(log),
        })
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.index.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Store `value` under `key`, replacing any previous value
    pub fn put(&self, key: &str, value: V) -> Result<()> {
        let payload = encode(key, &value)?;
        let slot = self.index.entry(key.to_string());
        self.log.lock().append(&payload)?;
        slot.insert(value);
        Ok(())
    }

    /// Read-modify-write of one key under its shard lock.
    ///
    /// `f` starts from `V::default()` when the key is absent. Nothing is
    /// written if `f` fails. `f` must not touch this map.
    pub fn update<F>(&self, key: &str, f: F) -> Result<()>
    where
        V: Default,
        F: FnOnce(&mut V) -> Result<()>,
    {
        let slot = self.index.entry(key.to_string());
        let mut value = match &slot {
            Entry::Occupied(occupied) => occupied.get().clone(),
            Entry::Vacant(_) => V::default(),
        };
        f(&mut value)?;

        let payload = encode(key, &value)?;
        self.log.lock().append(&payload)?;
        slot.insert(value);
        Ok(())
    }

    /// Clone of every entry. Each value is read atomically; the set as a
    /// whole may interleave with concurrent puts.
    pub fn snapshot(&self) -> Vec<(String, V)> {
        self.index
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn sync(&self) -> Result<()> {
        self.log.lock().sync()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

fn encode<V: Serialize>(key: &str, value: &V) -> Result<Vec<u8>> {
    rmp_serde::to_vec(&(key, value)).map_err(|e| Error::Serialization {
        message: format!("Failed to encode entry for {}: {}", key, e),
    })
}

fn decode<V: DeserializeOwned>(data: &[u8]) -> Result<(String, V)> {
    rmp_serde::from_slice(data).map_err(|e| Error::Serialization {
        message: format!("Failed to decode entry: {}", e),
    })
}
