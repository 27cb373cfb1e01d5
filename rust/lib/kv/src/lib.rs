//! Origin-scoped key-value storage for client preferences.
//!
//! Everything the client persists between sessions goes through
//! [`KVStore`]. Two backends ship with the crate:
//!
//! - [`MemoryKV`]: process-local map, optionally quota-limited.
//! - [`RedbStore`]: durable single-file store backed by redb.
//!
//! [`ScopedKV`] wraps either one and confines all keys to an origin
//! namespace, so several apps can share one database file.

pub mod error;
pub mod memory;
pub mod redb;
pub mod scoped;
pub mod traits;

pub use error::KVError;
pub use memory::MemoryKV;
pub use redb::RedbStore;
pub use scoped::ScopedKV;
pub use traits::KVStore;
