//! Request interceptor: degrade "device is offline" into "accepted for
//! later delivery".
//!
//! Exactly one failure mode is recovered here: a connectivity failure
//! on an original (non-replay) call while the platform reports the
//! client offline. Everything else (validation errors, auth failures,
//! server errors, failing replays) propagates to the caller unchanged.
//! The interceptor must never mask a real backend answer as a queued
//! success.

use std::sync::Arc;

use crate::connectivity::ConnectivityWatch;
use crate::session::Session;
use crate::status::StatusObserver;
use crate::store::{QueueStore, QueueStoreError};
use crate::transport::{Transport, TransportError};
use crate::trigger::{RegistrationStatus, SYNC_TAG, SyncRegistrar};
use crate::types::{ApiResponse, OutboundRequest};

/// Error returned by [`ApiClient::send`].
#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The call could not be delivered *and* could not be queued. The
    /// mutation is lost unless the caller retries; claiming success
    /// here would silently drop the user's data.
    #[error("offline queue unavailable: {0}")]
    Queue(#[from] QueueStoreError),
}

/// API entry point for UI code. Wraps the transport with session-header
/// attachment and the offline-queue fallback.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    store: Arc<dyn QueueStore>,
    session: Arc<Session>,
    connectivity: Arc<ConnectivityWatch>,
    registrar: Arc<dyn SyncRegistrar>,
    status: Arc<StatusObserver>,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn QueueStore>,
        session: Arc<Session>,
        connectivity: Arc<ConnectivityWatch>,
        registrar: Arc<dyn SyncRegistrar>,
        status: Arc<StatusObserver>,
    ) -> Self {
        Self {
            transport,
            store,
            session,
            connectivity,
            registrar,
            status,
        }
    }

    /// Issue an API call, queueing it for later delivery if it fails
    /// while the client is offline.
    ///
    /// Session headers are attached here, before the attempt, so a
    /// queued entry carries the auth/org context active at enqueue
    /// time. A later replay reuses those captured headers rather than
    /// the session active at flush time; a token refresh or org switch
    /// in between means the replay goes out with the older context.
    pub async fn send(&self, request: OutboundRequest) -> Result<ApiResponse, ApiClientError> {
        let mut request = request;
        for (name, value) in self.session.header_pairs() {
            request.upsert_header(&name, value);
        }

        match self.transport.send(&request).await {
            Ok(response) => Ok(response),
            Err(TransportError::Connectivity(reason))
                if self.connectivity.is_offline() && !request.replay =>
            {
                tracing::info!(
                    method = %request.method,
                    url = %request.url,
                    "offline, queueing request for later delivery: {reason}"
                );
                self.queue_for_later(request).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn queue_for_later(
        &self,
        request: OutboundRequest,
    ) -> Result<ApiResponse, ApiClientError> {
        // A storage failure propagates: we must not acknowledge a
        // mutation we could not persist.
        let entry = self.store.enqueue(request).await?;

        match self.registrar.register(SYNC_TAG).await {
            RegistrationStatus::Registered => {
                tracing::debug!(id = %entry.id, "background sync registered");
            }
            RegistrationStatus::Unsupported => {
                tracing::debug!("background sync unsupported on this platform");
            }
            RegistrationStatus::Failed(err) => {
                tracing::warn!("background sync registration failed: {err}");
            }
        }

        self.status.publish().await;
        Ok(ApiResponse::offline_queued())
    }
}
