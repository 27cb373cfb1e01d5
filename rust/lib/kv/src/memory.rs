use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::debug;

use crate::error::KVError;
use crate::traits::KVStore;

/// MemoryKV keeps every entry in an in-process `BTreeMap`.
///
/// Used when no database path is configured and throughout the tests.
/// An optional byte quota mimics the storage limits browsers impose on
/// origin storage: a write that would push the total size of keys plus
/// values past the limit fails with `KVError::QuotaExceeded` and leaves
/// the store untouched.
pub struct MemoryKV {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    quota: Option<usize>,
}

impl MemoryKV {
    /// Create an unbounded in-memory store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            quota: None,
        }
    }

    /// Create a store that rejects writes once `limit` bytes are used.
    pub fn with_quota(limit: usize) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            quota: Some(limit),
        }
    }

    /// Total bytes held (keys plus values).
    pub fn used_bytes(&self) -> usize {
        let entries = self.entries.read().unwrap();
        entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryKV {
    fn default() -> Self {
        Self::new()
    }
}

impl KVStore for MemoryKV {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        let entries = self.entries.read().unwrap();
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        let mut entries = self.entries.write().unwrap();
        if let Some(limit) = self.quota {
            let current: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if current + key.len() + value.len() > limit {
                debug!("MemoryKV: write to {} rejected, quota {} bytes", key, limit);
                return Err(KVError::QuotaExceeded {
                    key: key.to_string(),
                    limit,
                });
            }
        }
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        let mut entries = self.entries.write().unwrap();
        entries.remove(key);
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        let entries = self.entries.read().unwrap();
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
