//! Queue status derivation and broadcast.
//!
//! The status observer is the only channel through which queue problems
//! become visible to the user: pending count, oldest/newest enqueue
//! time, connectivity, and the last sync attempt/success/error. There
//! is no per-entry error log; a stuck entry manifests as a count that
//! never reaches zero.

use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::connectivity::ConnectivityWatch;
use crate::store::{QueueStore, QueueStoreError};
use crate::types::{ConnectivityState, QueueStats};

/// Sync activity surfaced alongside queue depth.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncActivity {
    pub syncing: bool,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// A live subscription to queue stats updates.
///
/// Dropping the subscription unsubscribes; the observer prunes dead
/// subscribers on the next broadcast.
#[derive(Debug)]
pub struct StatsSubscription {
    receiver: mpsc::Receiver<QueueStats>,
}

impl StatsSubscription {
    /// Block until the next stats update.
    pub fn recv(&self) -> Result<QueueStats, mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Receive a pending update without blocking.
    pub fn try_recv(&self) -> Result<QueueStats, mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for an update.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<QueueStats, mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Derives queue stats from the store and broadcasts them to any number
/// of independent subscribers (fire-and-forget fan-out).
pub struct StatusObserver {
    store: Arc<dyn QueueStore>,
    connectivity: Arc<ConnectivityWatch>,
    subscribers: Mutex<Vec<mpsc::Sender<QueueStats>>>,
    activity: Mutex<SyncActivity>,
}

impl StatusObserver {
    pub fn new(store: Arc<dyn QueueStore>, connectivity: Arc<ConnectivityWatch>) -> Self {
        Self {
            store,
            connectivity,
            subscribers: Mutex::new(Vec::new()),
            activity: Mutex::new(SyncActivity::default()),
        }
    }

    /// Current connectivity, read straight from the platform-fed watch.
    pub fn connectivity(&self) -> ConnectivityState {
        self.connectivity.state()
    }

    /// Current stats, recomputed from the live store contents.
    pub async fn stats(&self) -> Result<QueueStats, QueueStoreError> {
        self.store.stats().await
    }

    /// Subscribe to stats updates. Delivers one initial snapshot, then
    /// an update on every queue change.
    pub async fn subscribe(&self) -> Result<StatsSubscription, QueueStoreError> {
        let snapshot = self.store.stats().await?;
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(snapshot);
        self.subscribers.lock().unwrap().push(tx);
        Ok(StatsSubscription { receiver: rx })
    }

    /// Recompute stats and broadcast to all live subscribers.
    ///
    /// Called on every enqueue and every successful removal. Best
    /// effort: a store error here is logged, not propagated, since the
    /// queue operation that triggered the broadcast already succeeded.
    pub async fn publish(&self) {
        let stats = match self.store.stats().await {
            Ok(stats) => stats,
            Err(err) => {
                tracing::warn!("failed to recompute queue stats: {err}");
                return;
            }
        };

        // Drop any dead subscribers while publishing.
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(stats).is_ok());
    }

    /// A flush pass started.
    pub fn record_attempt(&self) {
        let mut activity = self.activity.lock().unwrap();
        activity.syncing = true;
        activity.last_attempt = Some(Utc::now());
    }

    /// A flush pass drained everything it set out to replay.
    pub fn record_success(&self) {
        let mut activity = self.activity.lock().unwrap();
        activity.syncing = false;
        activity.last_success = Some(Utc::now());
        activity.last_error = None;
    }

    /// A flush pass stopped on a failed replay.
    pub fn record_error(&self, message: impl Into<String>) {
        let mut activity = self.activity.lock().unwrap();
        activity.syncing = false;
        activity.last_error = Some(message.into());
    }

    pub fn activity(&self) -> SyncActivity {
        self.activity.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryQueueStore;
    use crate::types::OutboundRequest;
    use serde_json::json;

    fn observer() -> (Arc<InMemoryQueueStore>, StatusObserver) {
        let store = InMemoryQueueStore::arc();
        let watch = Arc::new(ConnectivityWatch::new());
        let observer = StatusObserver::new(store.clone(), watch);
        (store, observer)
    }

    #[tokio::test]
    async fn subscribers_get_an_initial_snapshot() {
        let (_store, observer) = observer();
        let subscription = observer.subscribe().await.unwrap();
        let stats = subscription.try_recv().unwrap();
        assert_eq!(stats.count, 0);
    }

    #[tokio::test]
    async fn all_subscribers_observe_the_same_update() {
        let (store, observer) = observer();
        let first = observer.subscribe().await.unwrap();
        let second = observer.subscribe().await.unwrap();
        let _ = first.try_recv().unwrap();
        let _ = second.try_recv().unwrap();

        store
            .enqueue(OutboundRequest::post("/api/quotes/", json!({})))
            .await
            .unwrap();
        observer.publish().await;

        assert_eq!(first.try_recv().unwrap().count, 1);
        assert_eq!(second.try_recv().unwrap().count, 1);
    }

    #[tokio::test]
    async fn dropped_subscriptions_are_pruned_on_publish() {
        let (_store, observer) = observer();
        let kept = observer.subscribe().await.unwrap();
        let dropped = observer.subscribe().await.unwrap();
        drop(dropped);

        observer.publish().await;
        observer.publish().await;

        assert_eq!(observer.subscribers.lock().unwrap().len(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[tokio::test]
    async fn activity_tracks_attempt_success_and_error() {
        let (_store, observer) = observer();
        assert!(observer.activity().last_attempt.is_none());

        observer.record_attempt();
        let activity = observer.activity();
        assert!(activity.syncing);
        assert!(activity.last_attempt.is_some());

        observer.record_error("API error (422): stale reference");
        let activity = observer.activity();
        assert!(!activity.syncing);
        assert_eq!(
            activity.last_error.as_deref(),
            Some("API error (422): stale reference")
        );

        observer.record_attempt();
        observer.record_success();
        let activity = observer.activity();
        assert!(!activity.syncing);
        assert!(activity.last_success.is_some());
        assert!(activity.last_error.is_none());
    }
}
