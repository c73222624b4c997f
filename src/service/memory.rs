//! In-memory record store.
//!
//! [`InMemoryService`] keeps all records in a `HashMap` behind a
//! [`tokio::sync::RwLock`]. Reads run concurrently; create, delete and close
//! take the write lock, so no request ever observes the map mid-mutation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{NOTHING_TO_DELETE, Service};
use crate::domain::{DeleteFilter, ListFilter, NewRecord, Record, RecordId};
use crate::error::DomainError;

#[derive(Debug, Default)]
struct Store {
    records: HashMap<RecordId, (u64, Record)>,
    next_seq: u64,
}

/// Ephemeral [`Service`] backend.
///
/// Insertion order is tracked with a sequence number so that records created
/// within the same millisecond still list newest first.
#[derive(Debug, Default)]
pub struct InMemoryService {
    store: RwLock<Store>,
}

impl InMemoryService {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.store.read().await.records.len()
    }

    /// Returns `true` if the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.store.read().await.records.is_empty()
    }
}

#[async_trait]
impl Service for InMemoryService {
    async fn create(&self, new: NewRecord) -> Result<Record, DomainError> {
        let record = new.into_record()?;
        let mut store = self.store.write().await;
        let seq = store.next_seq;
        store.next_seq = seq.saturating_add(1);
        store.records.insert(record.id, (seq, record.clone()));
        tracing::debug!(id = %record.id, level = %record.level, "record created");
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Record, DomainError> {
        let id: RecordId = id.parse()?;
        let store = self.store.read().await;
        store
            .records
            .get(&id)
            .map(|(_, record)| record.clone())
            .ok_or_else(|| DomainError::not_found(format!("log entry {id} not found")))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Record>, DomainError> {
        let store = self.store.read().await;
        let mut matched: Vec<&(u64, Record)> = store
            .records
            .values()
            .filter(|(_, record)| filter.matches(record))
            .collect();
        sort_newest_first(&mut matched);

        let limit = filter.recent.unwrap_or(usize::MAX);
        Ok(matched
            .into_iter()
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn delete(&self, filter: &DeleteFilter) -> Result<(), DomainError> {
        let mut store = self.store.write().await;
        match *filter {
            DeleteFilter::ById(id) => {
                store.records.remove(&id);
                tracing::debug!(%id, "record deleted");
                Ok(())
            }
            DeleteFilter::Before(cutoff) => {
                let before = store.records.len();
                store
                    .records
                    .retain(|_, (_, record)| record.timestamp_millis() >= cutoff);
                let removed = before.saturating_sub(store.records.len());
                if removed == 0 {
                    return Err(DomainError::bad_request(NOTHING_TO_DELETE));
                }
                tracing::debug!(cutoff, removed, "records deleted");
                Ok(())
            }
        }
    }

    async fn close(&self) -> Result<(), DomainError> {
        *self.store.write().await = Store::default();
        Ok(())
    }
}

/// Sorts newest first: timestamp descending, then insertion descending.
fn sort_newest_first(records: &mut [&(u64, Record)]) {
    records.sort_by(|(seq_a, a), (seq_b, b)| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| seq_b.cmp(seq_a))
    });
}
