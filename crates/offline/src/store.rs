//! Durable queue store abstraction and the in-memory implementation.
//!
//! The store is an ordered, append/delete-only collection of pending
//! requests. Entries are totally ordered by store-assigned id, and that
//! order equals enqueue order. An entry exists in the store if and only
//! if it has not yet been successfully replayed.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use crate::types::{EntryId, OutboundRequest, QueueStats, QueuedRequest};

/// Queue store error.
///
/// Storage being unavailable (quota exceeded, corruption) is a hard
/// failure surfaced to the caller. Dropping a mutation silently would
/// corrupt the user's data.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueStoreError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("corrupt queue entry {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

/// Durable, ordered persistence of pending requests.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Append a new entry with a fresh, strictly increasing id and the
    /// current timestamp. Storage failures propagate; they are never
    /// swallowed.
    async fn enqueue(&self, request: OutboundRequest) -> Result<QueuedRequest, QueueStoreError>;

    /// All pending entries, ascending by id (a consistent point-in-time
    /// view).
    async fn list_in_order(&self) -> Result<Vec<QueuedRequest>, QueueStoreError>;

    /// Delete a single entry. Idempotent: removing an absent id is a
    /// no-op, not an error.
    async fn remove(&self, id: EntryId) -> Result<(), QueueStoreError>;

    /// Number of pending entries.
    async fn count(&self) -> Result<usize, QueueStoreError>;

    /// Derived stats (count plus min/max enqueue time). Computed by a
    /// full scan; the queue holds at most a few hundred entries.
    async fn stats(&self) -> Result<QueueStats, QueueStoreError>;
}

/// In-memory queue store for tests/dev.
#[derive(Debug)]
pub struct InMemoryQueueStore {
    entries: RwLock<BTreeMap<i64, QueuedRequest>>,
    next_id: AtomicI64,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn arc() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::new())
    }
}

impl Default for InMemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

fn stats_of(entries: &BTreeMap<i64, QueuedRequest>) -> QueueStats {
    let mut stats = QueueStats {
        count: entries.len(),
        ..QueueStats::default()
    };
    for entry in entries.values() {
        let at = entry.enqueued_at;
        stats.oldest_timestamp = Some(match stats.oldest_timestamp {
            Some(oldest) if oldest <= at => oldest,
            _ => at,
        });
        stats.newest_timestamp = Some(match stats.newest_timestamp {
            Some(newest) if newest >= at => newest,
            _ => at,
        });
    }
    stats
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn enqueue(&self, request: OutboundRequest) -> Result<QueuedRequest, QueueStoreError> {
        // Stored entries are always originals; the replay tag is applied
        // at replay time.
        let mut request = request;
        request.replay = false;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let entry = QueuedRequest {
            id: EntryId(id),
            request,
            enqueued_at: Utc::now(),
        };

        let mut entries = self
            .entries
            .write()
            .map_err(|_| QueueStoreError::Storage("queue lock poisoned".to_string()))?;
        entries.insert(id, entry.clone());
        Ok(entry)
    }

    async fn list_in_order(&self) -> Result<Vec<QueuedRequest>, QueueStoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| QueueStoreError::Storage("queue lock poisoned".to_string()))?;
        Ok(entries.values().cloned().collect())
    }

    async fn remove(&self, id: EntryId) -> Result<(), QueueStoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| QueueStoreError::Storage("queue lock poisoned".to_string()))?;
        entries.remove(&id.0);
        Ok(())
    }

    async fn count(&self) -> Result<usize, QueueStoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| QueueStoreError::Storage("queue lock poisoned".to_string()))?;
        Ok(entries.len())
    }

    async fn stats(&self) -> Result<QueueStats, QueueStoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| QueueStoreError::Storage("queue lock poisoned".to_string()))?;
        Ok(stats_of(&entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(url: &str) -> OutboundRequest {
        OutboundRequest::post(url, json!({"n": 1}))
    }

    #[tokio::test]
    async fn ids_are_assigned_in_enqueue_order() {
        let store = InMemoryQueueStore::new();

        let first = store.enqueue(request("/api/invoices/")).await.unwrap();
        let second = store.enqueue(request("/api/products/")).await.unwrap();
        let third = store.enqueue(request("/api/customers/")).await.unwrap();

        assert!(first.id < second.id && second.id < third.id);

        let listed = store.list_in_order().await.unwrap();
        let urls: Vec<_> = listed.iter().map(|e| e.request.url.as_str()).collect();
        assert_eq!(urls, ["/api/invoices/", "/api/products/", "/api/customers/"]);
    }

    #[tokio::test]
    async fn enqueue_strips_the_replay_tag() {
        let store = InMemoryQueueStore::new();
        let entry = store
            .enqueue(request("/api/invoices/").into_replay())
            .await
            .unwrap();
        assert!(!entry.request.replay);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = InMemoryQueueStore::new();
        let entry = store.enqueue(request("/api/invoices/")).await.unwrap();

        store.remove(entry.id).await.unwrap();
        store.remove(entry.id).await.unwrap();
        store.remove(EntryId(999)).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stats_track_count_and_age_bounds() {
        let store = InMemoryQueueStore::new();
        assert_eq!(store.stats().await.unwrap(), QueueStats::default());

        let first = store.enqueue(request("/api/invoices/")).await.unwrap();
        let second = store.enqueue(request("/api/products/")).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.oldest_timestamp, Some(first.enqueued_at));
        assert_eq!(stats.newest_timestamp, Some(second.enqueued_at));
        assert!(first.enqueued_at <= second.enqueued_at);

        store.remove(first.id).await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.oldest_timestamp, Some(second.enqueued_at));
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 64,
                ..ProptestConfig::default()
            })]

            /// Property: for any sequence of enqueues, listing returns
            /// entries sorted by id ascending and id order equals
            /// enqueue call order.
            #[test]
            fn listing_preserves_fifo_order(urls in proptest::collection::vec("/api/[a-z]{1,12}/", 1..40)) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .unwrap();
                rt.block_on(async {
                    let store = InMemoryQueueStore::new();
                    let mut enqueued = Vec::new();
                    for url in &urls {
                        let entry = store.enqueue(OutboundRequest::get(url.clone())).await.unwrap();
                        enqueued.push(entry.id);
                    }

                    let listed = store.list_in_order().await.unwrap();
                    let ids: Vec<_> = listed.iter().map(|e| e.id).collect();
                    prop_assert_eq!(&ids, &enqueued);
                    prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));

                    let times: Vec<_> = listed.iter().map(|e| e.enqueued_at).collect();
                    prop_assert!(times.windows(2).all(|w| w[0] <= w[1]));
                    Ok(())
                })?;
            }
        }
    }
}
