//! Flush engine: drain the durable queue against the live API.
//!
//! Replays run strictly sequentially in id order, and the pass stops on
//! the first failed replay. Queued mutations are assumed causally
//! ordered (a "create invoice" must land before an "add line to that
//! invoice" queued after it), so skipping a failed entry and replaying
//! newer ones would risk applying operations against state that does
//! not exist yet server-side.
//!
//! A failed replay is not classified further: a server-side rejection
//! stops the pass exactly like a connectivity failure. The consequence
//! (a permanently-invalid entry blocks everything behind it until
//! resolved out of band) is a known limitation, asserted by test
//! rather than patched over with a dead-letter queue.

use std::sync::Arc;

use crate::status::StatusObserver;
use crate::store::{QueueStore, QueueStoreError};
use crate::transport::{Transport, TransportError};

/// How a flush pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Every pending entry replayed and was removed.
    Drained,
    /// A replay failed; that entry and everything newer remain queued.
    Stopped,
    /// Another flush pass was already in flight; nothing was attempted.
    AlreadyRunning,
}

/// Result of one flush pass.
#[derive(Debug, Clone)]
pub struct FlushReport {
    pub outcome: FlushOutcome,
    pub replayed: usize,
    pub remaining: usize,
}

/// Replays the durable queue in order, removing entries as they land.
pub struct FlushEngine {
    store: Arc<dyn QueueStore>,
    transport: Arc<dyn Transport>,
    status: Arc<StatusObserver>,
    in_flight: tokio::sync::Mutex<()>,
}

impl FlushEngine {
    pub fn new(
        store: Arc<dyn QueueStore>,
        transport: Arc<dyn Transport>,
        status: Arc<StatusObserver>,
    ) -> Self {
        Self {
            store,
            transport,
            status,
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one flush pass.
    ///
    /// Safe to invoke from any number of triggers: overlapping calls
    /// are serialized by an in-flight guard, so two near-simultaneous
    /// triggers cannot double-submit the same leading entry.
    pub async fn flush(&self) -> Result<FlushReport, QueueStoreError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::debug!("flush already in progress, skipping");
            let remaining = self.store.count().await?;
            return Ok(FlushReport {
                outcome: FlushOutcome::AlreadyRunning,
                replayed: 0,
                remaining,
            });
        };

        self.status.record_attempt();

        let entries = self.store.list_in_order().await?;
        tracing::debug!(pending = entries.len(), "starting queue flush");

        let mut replayed = 0usize;
        let mut stop_error: Option<TransportError> = None;

        for entry in entries {
            let request = entry.request.clone().into_replay();
            match self.transport.send(&request).await {
                Ok(_) => {
                    // Remove before advancing; the entry's job is done.
                    self.store.remove(entry.id).await?;
                    replayed += 1;
                    self.status.publish().await;
                }
                Err(err) => {
                    // Leave this entry and everything newer untouched.
                    tracing::warn!(id = %entry.id, "replay failed, stopping flush: {err}");
                    stop_error = Some(err);
                    break;
                }
            }
        }

        let remaining = self.store.count().await?;
        let outcome = match stop_error {
            Some(err) => {
                self.status.record_error(err.to_string());
                FlushOutcome::Stopped
            }
            None => {
                self.status.record_success();
                FlushOutcome::Drained
            }
        };

        tracing::info!(replayed, remaining, ?outcome, "queue flush finished");
        Ok(FlushReport {
            outcome,
            replayed,
            remaining,
        })
    }
}
