//! ---
//! sw_section: "03-persistence-logging"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Timing record persistence abstractions and storage bindings."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::record::{insertion_timestamp, NewTimingRecord, TimingRecord};
use crate::store::RecordStore;
use crate::Result;

#[derive(Debug)]
struct MemoryInner {
    records: BTreeMap<i64, TimingRecord>,
    next_id: i64,
}

/// Non-durable record store held in process memory.
///
/// Contents vanish with the process. Ids start at the configured first id
/// (1 by default) and increase with every insert; deleted ids are never
/// reused.
#[derive(Debug)]
pub struct FallbackStore {
    inner: Mutex<MemoryInner>,
}

impl FallbackStore {
    /// Empty store whose first record receives id 1.
    pub fn new() -> Self {
        Self::with_first_id(1)
    }

    /// Empty store numbering its records from `first_id`.
    pub fn with_first_id(first_id: i64) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                records: BTreeMap::new(),
                next_id: first_id,
            }),
        }
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// True when no records are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FallbackStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for FallbackStore {
    fn backend(&self) -> &'static str {
        "fallback"
    }

    async fn list(&self, user_id: Option<i64>) -> Result<Vec<TimingRecord>> {
        let inner = self.inner.lock();
        Ok(inner
            .records
            .values()
            .filter(|record| user_id.map_or(true, |uid| record.user_id == Some(uid)))
            .cloned()
            .collect())
    }

    async fn get(&self, id: i64) -> Result<Option<TimingRecord>> {
        Ok(self.inner.lock().records.get(&id).cloned())
    }

    async fn create(&self, input: NewTimingRecord) -> Result<TimingRecord> {
        input.validate()?;
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        let record = input.into_record(id, insertion_timestamp())?;
        inner.next_id += 1;
        inner.records.insert(id, record.clone());
        Ok(record)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.inner.lock().records.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let store = FallbackStore::new();
        let first = store.create(NewTimingRecord::new(1_000)).await.unwrap();
        let second = store
            .create(NewTimingRecord::new(2_000).with_title("Second").with_user(4))
            .await
            .unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(second.title.as_deref(), Some("Second"));
        assert_eq!(second.user_id, Some(4));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn list_filters_by_user_including_zero() {
        let store = FallbackStore::new();
        store.create(NewTimingRecord::new(10).with_user(0)).await.unwrap();
        store.create(NewTimingRecord::new(20).with_user(3)).await.unwrap();
        store.create(NewTimingRecord::new(30)).await.unwrap();

        assert_eq!(store.list(None).await.unwrap().len(), 3);
        let zero = store.list(Some(0)).await.unwrap();
        assert_eq!(zero.len(), 1);
        assert_eq!(zero[0].duration_ms, 10);
        assert!(store.list(Some(99)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn negative_duration_leaves_store_untouched() {
        let store = FallbackStore::new();
        let err = store.create(NewTimingRecord::new(-1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.is_empty());
        let next = store.create(NewTimingRecord::new(5)).await.unwrap();
        assert_eq!(next.id, 1);
    }

    #[tokio::test]
    async fn delete_reports_existence_and_ids_are_not_reused() {
        let store = FallbackStore::new();
        let record = store.create(NewTimingRecord::new(5)).await.unwrap();
        assert!(store.delete(record.id).await.unwrap());
        assert!(!store.delete(record.id).await.unwrap());
        assert!(!store.delete(404).await.unwrap());
        assert!(store.get(record.id).await.unwrap().is_none());
        let next = store.create(NewTimingRecord::new(6)).await.unwrap();
        assert_eq!(next.id, 2);
    }

    #[tokio::test]
    async fn first_id_offsets_numbering() {
        let store = FallbackStore::with_first_id(500);
        let first = store.create(NewTimingRecord::new(1)).await.unwrap();
        let second = store.create(NewTimingRecord::new(2)).await.unwrap();
        assert_eq!((first.id, second.id), (500, 501));
        assert!(store.get(1).await.unwrap().is_none());
    }
}
