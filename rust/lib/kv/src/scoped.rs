use crate::error::KVError;
use crate::traits::KVStore;

/// ScopedKV confines a store to one origin.
///
/// Every key is stored as `{origin}/{key}`; reads, writes and scans never
/// see another origin's entries. Keys returned from `scan` have the
/// origin prefix stripped again, so callers only deal in their own key
/// names.
pub struct ScopedKV<S: KVStore> {
    prefix: String,
    inner: S,
}

impl<S: KVStore> ScopedKV<S> {
    pub fn new(origin: &str, inner: S) -> Self {
        Self {
            prefix: format!("{}/", origin.trim_end_matches('/')),
            inner,
        }
    }

    /// The origin this store is scoped to.
    pub fn origin(&self) -> &str {
        self.prefix.trim_end_matches('/')
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl<S: KVStore> KVStore for ScopedKV<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        self.inner.get(&self.full_key(key))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        self.inner.set(&self.full_key(key), value)
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        self.inner.delete(&self.full_key(key))
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        let entries = self.inner.scan(&self.full_key(prefix))?;
        Ok(entries
            .into_iter()
            .filter_map(|(k, v)| k.strip_prefix(&self.prefix).map(|k| (k.to_string(), v)))
            .collect())
    }
}
