//! Synchronization triggers.
//!
//! Three independent, redundant signals can start a flush: the platform
//! reporting connectivity restored, a background-sync wake-up relayed
//! from the service-worker context, and an explicit user action. None
//! is individually reliable (online events can be missed while the tab
//! is backgrounded, and background sync is not available on every
//! platform), so all three feed the same worker, and the flush engine
//! tolerates repeated invocation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

use crate::flush::FlushEngine;

/// Background-sync tag registered with the platform at enqueue time.
pub const SYNC_TAG: &str = "sync-queue";

/// Why a flush was requested. The flush engine itself never needs to
/// know; this exists for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// Platform reported connectivity restored.
    ConnectivityRestored,
    /// Background-sync wake-up relayed from the service-worker context.
    BackgroundSync,
    /// Explicit user action ("force sync").
    Manual,
}

/// Message broadcast by the service worker to every open application
/// instance when a platform background-sync event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncMessage {
    #[serde(rename = "SYNC_TRIGGER")]
    SyncTrigger,
}

/// Outcome of a background-sync registration attempt.
///
/// Registration is best effort: the other two triggers cover the gap,
/// so any outcome is logged and none is escalated to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationStatus {
    Registered,
    Unsupported,
    Failed(String),
}

/// Platform background-sync registration.
#[async_trait]
pub trait SyncRegistrar: Send + Sync {
    async fn register(&self, tag: &str) -> RegistrationStatus;
}

/// Registrar for platforms without background sync.
#[derive(Debug, Default)]
pub struct NoopRegistrar;

#[async_trait]
impl SyncRegistrar for NoopRegistrar {
    async fn register(&self, _tag: &str) -> RegistrationStatus {
        RegistrationStatus::Unsupported
    }
}

/// Fan-in point for the three trigger sources. Cheap to clone; sends
/// are fire-and-forget.
#[derive(Debug, Clone)]
pub struct SyncHub {
    tx: mpsc::UnboundedSender<SyncTrigger>,
}

impl SyncHub {
    /// Create the hub and the receiving end for a `SyncWorker`.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncTrigger>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn connectivity_restored(&self) {
        self.push(SyncTrigger::ConnectivityRestored);
    }

    /// Relay a message received from the service-worker context.
    pub fn background_sync(&self, message: &SyncMessage) {
        match message {
            SyncMessage::SyncTrigger => self.push(SyncTrigger::BackgroundSync),
        }
    }

    pub fn force_sync(&self) {
        self.push(SyncTrigger::Manual);
    }

    fn push(&self, trigger: SyncTrigger) {
        if self.tx.send(trigger).is_err() {
            tracing::warn!(?trigger, "sync worker is gone, dropping trigger");
        }
    }
}

/// Background task draining triggers into flush invocations.
pub struct SyncWorker {
    flush: Arc<FlushEngine>,
    shutdown: Arc<Notify>,
    triggers: mpsc::UnboundedReceiver<SyncTrigger>,
}

impl SyncWorker {
    pub fn new(
        flush: Arc<FlushEngine>,
        shutdown: Arc<Notify>,
        triggers: mpsc::UnboundedReceiver<SyncTrigger>,
    ) -> Self {
        Self {
            flush,
            shutdown,
            triggers,
        }
    }

    /// Spawn the worker loop. It runs until shutdown is signalled or
    /// every `SyncHub` handle is dropped.
    pub fn start(self) -> JoinHandle<()> {
        let Self {
            flush,
            shutdown,
            mut triggers,
        } = self;

        tokio::spawn(async move {
            tracing::info!("sync worker started");
            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    trigger = triggers.recv() => {
                        let Some(trigger) = trigger else { break };
                        tracing::debug!(?trigger, "sync trigger received");
                        match flush.flush().await {
                            Ok(report) => tracing::debug!(
                                replayed = report.replayed,
                                remaining = report.remaining,
                                "triggered flush finished"
                            ),
                            Err(err) => tracing::error!("triggered flush failed: {err}"),
                        }
                    }
                }
            }
            tracing::info!("sync worker stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sync_message_has_the_cross_context_shape() {
        let encoded = serde_json::to_value(SyncMessage::SyncTrigger).unwrap();
        assert_eq!(encoded, json!({ "type": "SYNC_TRIGGER" }));

        let decoded: SyncMessage =
            serde_json::from_value(json!({ "type": "SYNC_TRIGGER" })).unwrap();
        assert_eq!(decoded, SyncMessage::SyncTrigger);
    }

    #[test]
    fn unknown_message_types_do_not_parse() {
        assert!(serde_json::from_value::<SyncMessage>(json!({ "type": "CACHE_UPDATED" })).is_err());
    }

    #[tokio::test]
    async fn noop_registrar_reports_unsupported() {
        assert_eq!(
            NoopRegistrar.register(SYNC_TAG).await,
            RegistrationStatus::Unsupported
        );
    }
}
