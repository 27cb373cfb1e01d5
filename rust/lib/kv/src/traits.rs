use crate::error::KVError;

/// KVStore is the persistent key-value capability the client writes its
/// preferences to.
///
/// Every call may fail (disk errors, quota, a store opened read-only by
/// the platform). Callers in this workspace treat persistence as
/// best-effort and never let a `KVError` reach the user.
pub trait KVStore: Send + Sync {
    /// Get the value for a key. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError>;

    /// Set a key-value pair, overwriting any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), KVError>;

    /// Scan all keys matching a prefix. Returns sorted (key, value) pairs.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError>;
}

impl<T: KVStore + ?Sized> KVStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        (**self).delete(key)
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        (**self).scan(prefix)
    }
}
