//! The persistent-storage table abstraction (spec.md §6 "Persistent
//! storage tables required").
//!
//! The six named tables (`device_keys`, `resource_keys`, `users`,
//! `groups`, `trustchain`, `unverified`) are all instances of this one
//! trait, keyed and valued differently per table. A real SDK shell
//! backs this with a filesystem or SQLite store; tests use
//! [`crate::memory::MemoryTable`].

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Storage-layer failures, distinct from [`ward_core::WardError`]
/// because a table backend may fail in ways the core does not define
/// (disk full, corruption) — `ward-session` maps these into
/// [`ward_core::WardError::Internal`] or `::NetworkError` at the boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error("backend I/O failed: {0}")]
    Backend(String),
}

/// How to sort a [`Table::find`] query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A query against a table's declared index. `None` means "no filter,
/// return everything" (subject to `sort`/`limit`).
#[derive(Debug, Clone)]
pub struct Query<K> {
    pub key_prefix: Option<K>,
    pub sort: Option<SortOrder>,
    pub limit: Option<usize>,
}

impl<K> Default for Query<K> {
    fn default() -> Self {
        Self {
            key_prefix: None,
            sort: None,
            limit: None,
        }
    }
}

/// An indexed key/value table, implemented once per storage backend
/// and reused for every named table in spec.md §6.
#[async_trait]
pub trait Table<K, V>: Send + Sync
where
    K: Clone + Ord + Send + Sync,
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<V>, StoreError>;
    async fn put(&self, key: K, value: V) -> Result<(), StoreError>;
    async fn delete(&self, key: &K) -> Result<bool, StoreError>;
    async fn find(&self, query: Query<K>) -> Result<Vec<(K, V)>, StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
    async fn bulk_put(&self, entries: Vec<(K, V)>) -> Result<(), StoreError>;
    async fn bulk_get(&self, keys: &[K]) -> Result<Vec<(K, V)>, StoreError>;
}
