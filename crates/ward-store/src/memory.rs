//! In-memory reference [`Table`] implementation (SPEC_FULL.md §4 "An
//! in-memory reference implementation of every external trait"),
//! matching the teacher's pattern of shipping a test double beside
//! every effect trait.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};

use crate::table::{Query, SortOrder, StoreError, Table};

/// A `Table` backed by a `BTreeMap` behind a mutex. Suitable for tests
/// and for embedding directly in single-process deployments; real
/// multi-device sync still goes through the transport trait regardless
/// of which `Table` backend is chosen locally.
pub struct MemoryTable<K, V> {
    entries: Arc<Mutex<BTreeMap<K, V>>>,
}

impl<K, V> Default for MemoryTable<K, V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

impl<K, V> Clone for MemoryTable<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<K, V> MemoryTable<K, V> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<K, V> Table<K, V> for MemoryTable<K, V>
where
    K: Clone + Ord + Send + Sync,
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<V>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put(&self, key: K, value: V) -> Result<(), StoreError> {
        self.entries.lock().insert(key, value);
        Ok(())
    }

    async fn delete(&self, key: &K) -> Result<bool, StoreError> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn find(&self, query: Query<K>) -> Result<Vec<(K, V)>, StoreError> {
        let guard = self.entries.lock();
        let mut items: Vec<(K, V)> = guard
            .iter()
            .filter(|(key, _)| match &query.key_prefix {
                Some(prefix) => *key >= prefix,
                None => true,
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        drop(guard);

        if let Some(SortOrder::Descending) = query.sort {
            items.reverse();
        }
        if let Some(limit) = query.limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.entries.lock().clear();
        Ok(())
    }

    async fn bulk_put(&self, entries: Vec<(K, V)>) -> Result<(), StoreError> {
        let mut guard = self.entries.lock();
        for (key, value) in entries {
            guard.insert(key, value);
        }
        Ok(())
    }

    async fn bulk_get(&self, keys: &[K]) -> Result<Vec<(K, V)>, StoreError> {
        let guard = self.entries.lock();
        Ok(keys
            .iter()
            .filter_map(|key| guard.get(key).map(|v| (key.clone(), v.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let table: MemoryTable<u64, String> = MemoryTable::new();
        table.put(1, "alice".to_string()).await.expect("put");
        assert_eq!(table.get(&1).await.expect("get"), Some("alice".to_string()));
    }

    #[tokio::test]
    async fn delete_reports_whether_key_existed() {
        let table: MemoryTable<u64, String> = MemoryTable::new();
        assert!(!table.delete(&1).await.expect("delete"));
        table.put(1, "alice".to_string()).await.expect("put");
        assert!(table.delete(&1).await.expect("delete"));
    }

    #[tokio::test]
    async fn find_respects_limit_and_sort() {
        let table: MemoryTable<u64, u64> = MemoryTable::new();
        for i in 0..5 {
            table.put(i, i * 10).await.expect("put");
        }
        let ascending = table
            .find(Query {
                key_prefix: None,
                sort: Some(SortOrder::Ascending),
                limit: Some(2),
            })
            .await
            .expect("find");
        assert_eq!(ascending, vec![(0, 0), (1, 10)]);
    }

    #[tokio::test]
    async fn bulk_put_and_bulk_get_round_trip() {
        let table: MemoryTable<u64, u64> = MemoryTable::new();
        table
            .bulk_put(vec![(1, 10), (2, 20)])
            .await
            .expect("bulk_put");
        let got = table.bulk_get(&[1, 2, 3]).await.expect("bulk_get");
        assert_eq!(got, vec![(1, 10), (2, 20)]);
    }

    #[tokio::test]
    async fn clear_empties_the_table() {
        let table: MemoryTable<u64, u64> = MemoryTable::new();
        table.put(1, 10).await.expect("put");
        table.clear().await.expect("clear");
        assert_eq!(table.get(&1).await.expect("get"), None);
    }
}
